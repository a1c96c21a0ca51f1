pub mod analysis_response;
pub mod check;
pub mod verify_request;
