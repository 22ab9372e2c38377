mod geo_id;
mod geo_type;
mod state;

pub use geo_id::{GeoId, UNALLOCATED_SUFFIX};
pub use geo_type::GeoType;
