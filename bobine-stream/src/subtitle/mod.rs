pub mod burnin;
pub mod convert;
pub mod tonemap;

pub use burnin::{build_burn_in_filter, escape_filter_path, subtitle_relative_index};
pub use convert::{ass_to_webvtt, convert_to_webvtt, extract_embedded_webvtt, subrip_to_webvtt};
pub use tonemap::tone_map_chain;
