pub mod batch_config;
pub mod chromatogram;
pub mod peak_list;
