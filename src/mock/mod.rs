pub mod mock_conn;
pub mod mock_time;
