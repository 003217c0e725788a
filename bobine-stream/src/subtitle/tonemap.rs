//! HDR to SDR tone-mapping filter chains.

use crate::session::hwaccel::HwAccelKind;

/// Filter chain for converting HDR content to BT.709 SDR.
///
/// NVENC and QSV configurations run the software chain: in this pipeline
/// CUDA frames stay in system memory when filters are present, and QSV
/// frames are downloaded before software filtering. Only VAAPI tone-maps
/// on the device.
#[must_use]
pub fn tone_map_chain(hw: Option<HwAccelKind>) -> &'static str {
    match hw {
        Some(HwAccelKind::Vaapi) => "tonemap_vaapi=format=nv12",
        _ => {
            "zscale=t=linear:npl=100,tonemap=hable:desat=0,\
             zscale=p=bt709:t=bt709:m=bt709,format=yuv420p"
        }
    }
}
