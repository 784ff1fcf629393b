// Messaging - Commands in, notifications out, between the control thread
// and the scheduler thread

pub mod channels;
pub mod command;
pub mod notification;
