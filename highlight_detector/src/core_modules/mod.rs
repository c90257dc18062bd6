pub mod color_cluster;
pub mod color_space;
pub mod highlight_matcher;
pub mod mask;
pub mod palette_registry;
pub mod region;
pub mod region_detector;
pub mod utils;
