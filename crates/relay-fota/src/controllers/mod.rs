pub mod fota;
pub mod status;
