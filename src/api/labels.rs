//! Display labels for order statuses.
//!
//! Presentation lookup only: labels are never parsed back into a status.

use serde::{Deserialize, Serialize};

use crate::domain::aggregates::OrderStatus;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale { #[default] En, Vi }

pub const fn status_label(status: OrderStatus, locale: Locale) -> &'static str {
    use OrderStatus::*;
    match (locale, status) {
        (Locale::En, Pending) => "Awaiting confirmation",
        (Locale::En, Confirmed) => "Confirmed",
        (Locale::En, Preparing) => "Preparing",
        (Locale::En, Ready) => "Ready for pickup",
        (Locale::En, Delivering) => "Out for delivery",
        (Locale::En, Completed) => "Delivered",
        (Locale::En, Cancelled) => "Cancelled",
        (Locale::Vi, Pending) => "Chờ xác nhận",
        (Locale::Vi, Confirmed) => "Đã xác nhận",
        (Locale::Vi, Preparing) => "Đang chuẩn bị",
        (Locale::Vi, Ready) => "Chờ lấy hàng",
        (Locale::Vi, Delivering) => "Đang giao",
        (Locale::Vi, Completed) => "Đã giao",
        (Locale::Vi, Cancelled) => "Đã hủy",
    }
}

#[derive(Debug, Serialize)]
pub struct StatusLabel {
    pub status: OrderStatus,
    pub label: &'static str,
    pub terminal: bool,
}

pub fn label_table(locale: Locale) -> Vec<StatusLabel> {
    OrderStatus::ALL.into_iter()
        .map(|status| StatusLabel { status, label: status_label(status, locale), terminal: status.is_terminal() })
        .collect()
}
