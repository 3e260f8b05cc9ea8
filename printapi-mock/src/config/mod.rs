mod upload_route;

pub use self::upload_route::{UploadMethod, UploadRouteConfig};
