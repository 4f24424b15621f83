pub mod batch_log;
