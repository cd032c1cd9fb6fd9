use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use shared::models::claims::Role;
use utoipa::ToSchema;

use crate::domain::catalog::ServiceKind;

pub const MAX_COPIES: u32 = 500;
pub const MAX_PAGES: u32 = 2000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PricingError {
    #[error("page count must be between 1 and {}", MAX_PAGES)]
    PagesOutOfRange,

    #[error("copies must be between 1 and {}", MAX_COPIES)]
    CopiesOutOfRange,

    #[error("custom mode needs colour pages, e.g. \"1-3,7\"")]
    ColorPagesRequired,

    #[error("invalid colour page range \"{0}\"")]
    InvalidColorRange(String),

    #[error("colour page {page} is outside the document (1-{pages})")]
    ColorPageOutOfDocument { page: u32, pages: u32 },

    #[error("unknown print option \"{0}\"")]
    UnknownOption(String),

    #[error("invalid pricing configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PrintMode {
    Bw,
    #[serde(alias = "colour")]
    Color,
    Custom,
}

impl PrintMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrintMode::Bw => "bw",
            PrintMode::Color => "color",
            PrintMode::Custom => "custom",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bw" | "b&w" | "black_white" => Some(PrintMode::Bw),
            "color" | "colour" => Some(PrintMode::Color),
            "custom" => Some(PrintMode::Custom),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Sides {
    Single,
    Double,
}

impl Sides {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sides::Single => "single",
            Sides::Double => "double",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" | "1" => Some(Sides::Single),
            "double" | "2" => Some(Sides::Double),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BindingKind {
    None,
    Spiral,
    Soft,
    Thesis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Customer,
    Dealer,
}

impl UserType {
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Dealer => UserType::Dealer,
            _ => UserType::Customer,
        }
    }
}

/// Per-page rate in paise for each sidedness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SideRates {
    pub single: i64,
    pub double: i64,
}

impl SideRates {
    fn for_sides(&self, sides: Sides) -> i64 {
        match sides {
            Sides::Single => self.single,
            Sides::Double => self.double,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BindingTier {
    pub max_pages: u32,
    pub price: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BindingTiers {
    pub tiers: Vec<BindingTier>,
    pub overflow_per_page: i64,
}

impl BindingTiers {
    fn new(tiers: &[(u32, i64)], overflow_per_page: i64) -> Self {
        Self {
            tiers: tiers
                .iter()
                .map(|&(max_pages, price)| BindingTier { max_pages, price })
                .collect(),
            overflow_per_page,
        }
    }

    /// Price of binding one copy of `pages` pages.
    pub fn cost(&self, pages: u32) -> i64 {
        if let Some(tier) = self.tiers.iter().find(|t| t.max_pages >= pages) {
            return tier.price;
        }
        match self.tiers.last() {
            Some(top) => top.price + self.overflow_per_page * i64::from(pages - top.max_pages),
            None => self.overflow_per_page * i64::from(pages),
        }
    }

    fn validate(&self, name: &str) -> Result<(), PricingError> {
        if self.tiers.is_empty() {
            return Err(PricingError::InvalidConfig(format!("{} has no tiers", name)));
        }
        if self.overflow_per_page < 0 {
            return Err(PricingError::InvalidConfig(format!(
                "{} overflow rate is negative",
                name
            )));
        }
        for window in self.tiers.windows(2) {
            if window[1].max_pages <= window[0].max_pages {
                return Err(PricingError::InvalidConfig(format!(
                    "{} tiers must be strictly ascending",
                    name
                )));
            }
        }
        if self.tiers.iter().any(|t| t.price < 0 || t.max_pages == 0) {
            return Err(PricingError::InvalidConfig(format!(
                "{} has a negative price or an empty tier",
                name
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RateTable {
    pub bw: SideRates,
    pub color: SideRates,
    pub spiral: BindingTiers,
    pub soft: BindingTiers,
    pub thesis: BindingTiers,
    pub frame_rate: i64,
}

impl RateTable {
    pub fn binding(&self, kind: BindingKind) -> Option<&BindingTiers> {
        match kind {
            BindingKind::None => None,
            BindingKind::Spiral => Some(&self.spiral),
            BindingKind::Soft => Some(&self.soft),
            BindingKind::Thesis => Some(&self.thesis),
        }
    }

    fn validate(&self, name: &str) -> Result<(), PricingError> {
        let rates = [
            self.bw.single,
            self.bw.double,
            self.color.single,
            self.color.double,
            self.frame_rate,
        ];
        if rates.iter().any(|r| *r < 0) {
            return Err(PricingError::InvalidConfig(format!(
                "{} has a negative rate",
                name
            )));
        }
        self.spiral.validate(&format!("{}.spiral", name))?;
        self.soft.validate(&format!("{}.soft", name))?;
        self.thesis.validate(&format!("{}.thesis", name))?;
        Ok(())
    }
}

/// All price constants, one rate table per user type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PricingConfig {
    pub customer: RateTable,
    pub dealer: RateTable,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            customer: RateTable {
                bw: SideRates { single: 200, double: 150 },
                color: SideRates { single: 1000, double: 900 },
                spiral: BindingTiers::new(&[(50, 3000), (100, 4000), (200, 6000)], 30),
                soft: BindingTiers::new(&[(100, 5000), (200, 8000)], 40),
                thesis: BindingTiers::new(&[(100, 25000), (300, 35000)], 100),
                frame_rate: 19900,
            },
            dealer: RateTable {
                bw: SideRates { single: 150, double: 120 },
                color: SideRates { single: 800, double: 700 },
                spiral: BindingTiers::new(&[(50, 2500), (100, 3500), (200, 5000)], 25),
                soft: BindingTiers::new(&[(100, 4000), (200, 6500)], 30),
                thesis: BindingTiers::new(&[(100, 20000), (300, 30000)], 80),
                frame_rate: 16900,
            },
        }
    }
}

impl PricingConfig {
    pub fn table(&self, user_type: UserType) -> &RateTable {
        match user_type {
            UserType::Customer => &self.customer,
            UserType::Dealer => &self.dealer,
        }
    }

    pub fn validate(&self) -> Result<(), PricingError> {
        self.customer.validate("customer")?;
        self.dealer.validate("dealer")
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct QuoteInput {
    pub service: ServiceKind,
    pub print_mode: PrintMode,
    pub sides: Sides,
    #[serde(default)]
    pub pages: u32,
    pub copies: u32,
    pub color_pages: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Quote {
    pub bw_pages: u32,
    pub color_pages: u32,
    pub printing_per_copy: i64,
    pub binding_per_copy: i64,
    pub per_copy: i64,
    pub copies: u32,
    pub total: i64,
}

/// Parse ranges like `"1-3,7,10-12"` into the distinct pages they name.
pub fn parse_color_pages(ranges: &str, pages: u32) -> Result<BTreeSet<u32>, PricingError> {
    let mut selected = BTreeSet::new();

    for token in ranges.split(',') {
        let token = token.trim();
        let invalid = || PricingError::InvalidColorRange(token.to_string());

        let (start, end) = match token.split_once('-') {
            Some((a, b)) => (
                a.trim().parse::<u32>().map_err(|_| invalid())?,
                b.trim().parse::<u32>().map_err(|_| invalid())?,
            ),
            None => {
                let page = token.parse::<u32>().map_err(|_| invalid())?;
                (page, page)
            }
        };

        if start == 0 || start > end {
            return Err(invalid());
        }
        if end > pages {
            return Err(PricingError::ColorPageOutOfDocument { page: end, pages });
        }
        selected.extend(start..=end);
    }

    Ok(selected)
}

/// Price one job. Money is in paise.
pub fn quote(table: &RateTable, input: &QuoteInput) -> Result<Quote, PricingError> {
    if input.copies == 0 || input.copies > MAX_COPIES {
        return Err(PricingError::CopiesOutOfRange);
    }

    if input.service.is_photo_frame() {
        let total = table.frame_rate * i64::from(input.copies);
        return Ok(Quote {
            bw_pages: 0,
            color_pages: 0,
            printing_per_copy: table.frame_rate,
            binding_per_copy: 0,
            per_copy: table.frame_rate,
            copies: input.copies,
            total,
        });
    }

    let pages = input.pages;
    if pages == 0 || pages > MAX_PAGES {
        return Err(PricingError::PagesOutOfRange);
    }

    let color_pages = match input.print_mode {
        PrintMode::Bw => 0,
        PrintMode::Color => pages,
        PrintMode::Custom => {
            let ranges = input
                .color_pages
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or(PricingError::ColorPagesRequired)?;
            parse_color_pages(ranges, pages)?.len() as u32
        }
    };
    let bw_pages = pages - color_pages;

    let printing_per_copy = i64::from(bw_pages) * table.bw.for_sides(input.sides)
        + i64::from(color_pages) * table.color.for_sides(input.sides);
    let binding_per_copy = table
        .binding(input.service.binding())
        .map(|tiers| tiers.cost(pages))
        .unwrap_or(0);
    let per_copy = printing_per_copy + binding_per_copy;

    Ok(Quote {
        bw_pages,
        color_pages,
        printing_per_copy,
        binding_per_copy,
        per_copy,
        copies: input.copies,
        total: per_copy * i64::from(input.copies),
    })
}
