pub mod notification_dispatch;
