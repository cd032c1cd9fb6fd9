use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::catalog::ServiceKind;
use crate::domain::pricing::{PricingError, PrintMode, QuoteInput, Sides};
use crate::utils::money::format_rupees;

// A staged print job; `checkout_txn` is set while a checkout holds it
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct CartItem {
    pub id: i32,
    pub user_id: i32,
    pub service: String,
    #[serde(skip_serializing)]
    pub file_path: String,
    pub file_name: String,
    pub pages: i32,
    pub copies: i32,
    pub print_mode: String,
    pub sides: String,
    pub color_pages: Option<String>,
    pub location: Option<String>,
    pub price_paise: i64,
    #[serde(skip_serializing)]
    pub checkout_txn: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CartItem {
    pub fn is_locked(&self) -> bool {
        self.checkout_txn.is_some()
    }

    /// Rebuild the pricing input from the stored options.
    pub fn quote_input(&self) -> Result<QuoteInput, PricingError> {
        let service = ServiceKind::parse(&self.service)
            .ok_or_else(|| PricingError::UnknownOption(self.service.clone()))?;
        let print_mode = PrintMode::parse(&self.print_mode)
            .ok_or_else(|| PricingError::UnknownOption(self.print_mode.clone()))?;
        let sides = Sides::parse(&self.sides)
            .ok_or_else(|| PricingError::UnknownOption(self.sides.clone()))?;

        Ok(QuoteInput {
            service,
            print_mode,
            sides,
            pages: u32::try_from(self.pages).map_err(|_| PricingError::PagesOutOfRange)?,
            copies: u32::try_from(self.copies).map_err(|_| PricingError::CopiesOutOfRange)?,
            color_pages: self.color_pages.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewCartItem {
    pub user_id: i32,
    pub service: ServiceKind,
    pub file_path: String,
    pub file_name: String,
    pub pages: u32,
    pub copies: u32,
    pub print_mode: PrintMode,
    pub sides: Sides,
    pub color_pages: Option<String>,
    pub location: Option<String>,
    pub price_paise: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartSummary {
    pub items: Vec<CartItem>,
    pub item_count: usize,
    pub subtotal_paise: i64,
    pub subtotal_display: String,
}

impl CartSummary {
    pub fn new(items: Vec<CartItem>) -> Self {
        let subtotal_paise = items.iter().map(|i| i.price_paise).sum();
        Self {
            item_count: items.len(),
            subtotal_paise,
            subtotal_display: format_rupees(subtotal_paise),
            items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(service: &str, mode: &str, sides: &str) -> CartItem {
        CartItem {
            id: 1,
            user_id: 7,
            service: service.to_string(),
            file_path: "temp/abc_notes.pdf".to_string(),
            file_name: "notes.pdf".to_string(),
            pages: 12,
            copies: 2,
            print_mode: mode.to_string(),
            sides: sides.to_string(),
            color_pages: None,
            location: None,
            price_paise: 4800,
            checkout_txn: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_quote_input_from_stored_options() {
        let input = item("Spiral Binding", "color", "double").quote_input().unwrap();
        assert_eq!(input.service, ServiceKind::SpiralBinding);
        assert_eq!(input.print_mode, PrintMode::Color);
        assert_eq!(input.sides, Sides::Double);
        assert_eq!(input.pages, 12);
    }

    #[test]
    fn test_unknown_option_is_reported() {
        assert_eq!(
            item("Lamination", "bw", "single").quote_input().unwrap_err(),
            PricingError::UnknownOption("Lamination".to_string())
        );
    }

    #[test]
    fn test_summary_totals() {
        let summary = CartSummary::new(vec![item("Printing", "bw", "single"), item("Printing", "bw", "single")]);
        assert_eq!(summary.item_count, 2);
        assert_eq!(summary.subtotal_paise, 9600);
        assert_eq!(summary.subtotal_display, "₹96.00");
    }
}
