use rtcp::source_description::SdesType;

/// Optional SDES items in the order they are cycled through.
pub const SDES_CYCLE: [SdesType; 7] = [
    SdesType::SdesName,
    SdesType::SdesEmail,
    SdesType::SdesPhone,
    SdesType::SdesLocation,
    SdesType::SdesTool,
    SdesType::SdesNote,
    SdesType::SdesPrivate,
];

/// SdesScheduler spreads the optional SDES items over successive reports,
/// one per report, so reports stay small.
#[derive(Debug, Default, Clone)]
pub struct SdesScheduler {
    cursor: usize,
}

impl SdesScheduler {
    /// schedule_next_sdes_item returns the next configured item at or after
    /// the cursor, wrapping around, and moves the cursor past it.
    pub fn schedule_next_sdes_item(&mut self, configured: &[SdesType]) -> Option<SdesType> {
        for step in 0..SDES_CYCLE.len() {
            let idx = (self.cursor + step) % SDES_CYCLE.len();
            let item = SDES_CYCLE[idx];
            if configured.contains(&item) {
                self.cursor = (idx + 1) % SDES_CYCLE.len();
                return Some(item);
            }
        }
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_schedule_next_sdes_item() {
        let mut scheduler = SdesScheduler::default();
        let configured = [SdesType::SdesNote, SdesType::SdesName, SdesType::SdesTool];

        let got: Vec<Option<SdesType>> = (0..5)
            .map(|_| scheduler.schedule_next_sdes_item(&configured))
            .collect();
        assert_eq!(
            got,
            vec![
                Some(SdesType::SdesName),
                Some(SdesType::SdesTool),
                Some(SdesType::SdesNote),
                Some(SdesType::SdesName),
                Some(SdesType::SdesTool),
            ]
        );
    }

    #[test]
    fn test_schedule_nothing_configured() {
        let mut scheduler = SdesScheduler::default();
        assert_eq!(scheduler.schedule_next_sdes_item(&[]), None);
        assert_eq!(
            scheduler.schedule_next_sdes_item(&[SdesType::SdesCname]),
            None,
            "CNAME goes in every report and is not cycled"
        );
    }

    #[test]
    fn test_schedule_private_wraps() {
        let mut scheduler = SdesScheduler::default();
        let configured = [SdesType::SdesPrivate];
        for _ in 0..3 {
            assert_eq!(
                scheduler.schedule_next_sdes_item(&configured),
                Some(SdesType::SdesPrivate)
            );
        }
    }
}
