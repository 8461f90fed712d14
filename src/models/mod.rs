pub mod checkin;
pub mod club;
pub mod event;
pub mod feedback;
pub mod notification;
pub mod participant;
pub mod reminder;
pub mod user;
