pub mod deleted_email;
pub mod exam_result;
pub mod otp;
pub mod payment;
pub mod preferences;
pub mod refresh_token;
pub mod subscription;
pub mod support_ticket;
pub mod user;
