use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::pricing::BindingKind;

// Services offered by the shop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum ServiceKind {
    #[serde(rename = "Printing")]
    Printing,
    #[serde(rename = "Spiral Binding")]
    SpiralBinding,
    #[serde(rename = "Soft Binding")]
    SoftBinding,
    #[serde(rename = "Custom Printing")]
    CustomPrinting,
    #[serde(rename = "Thesis Binding")]
    ThesisBinding,
    #[serde(rename = "Photo Frames")]
    PhotoFrames,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 6] = [
        ServiceKind::Printing,
        ServiceKind::SpiralBinding,
        ServiceKind::SoftBinding,
        ServiceKind::CustomPrinting,
        ServiceKind::ThesisBinding,
        ServiceKind::PhotoFrames,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Printing => "Printing",
            ServiceKind::SpiralBinding => "Spiral Binding",
            ServiceKind::SoftBinding => "Soft Binding",
            ServiceKind::CustomPrinting => "Custom Printing",
            ServiceKind::ThesisBinding => "Thesis Binding",
            ServiceKind::PhotoFrames => "Photo Frames",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
    }

    pub fn binding(&self) -> BindingKind {
        match self {
            ServiceKind::SpiralBinding => BindingKind::Spiral,
            ServiceKind::SoftBinding => BindingKind::Soft,
            ServiceKind::ThesisBinding => BindingKind::Thesis,
            _ => BindingKind::None,
        }
    }

    pub fn is_photo_frame(&self) -> bool {
        matches!(self, ServiceKind::PhotoFrames)
    }

    fn description(&self) -> &'static str {
        match self {
            ServiceKind::Printing => "Black & white or colour prints, single or double sided",
            ServiceKind::SpiralBinding => "Durable plastic spiral with clear covers",
            ServiceKind::SoftBinding => "Premium perfect binding with a soft cover",
            ServiceKind::CustomPrinting => "Mixed prints with selected colour pages",
            ServiceKind::ThesisBinding => "Hardcover thesis binding with gold embossing",
            ServiceKind::PhotoFrames => "Framed photo prints",
        }
    }

    fn icon(&self) -> &'static str {
        match self {
            ServiceKind::Printing => "fa-print",
            ServiceKind::SpiralBinding => "fa-book-open",
            ServiceKind::SoftBinding => "fa-book",
            ServiceKind::CustomPrinting => "fa-palette",
            ServiceKind::ThesisBinding => "fa-graduation-cap",
            ServiceKind::PhotoFrames => "fa-image",
        }
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CatalogEntry {
    pub name: ServiceKind,
    pub description: &'static str,
    pub icon: &'static str,
    pub binding: BindingKind,
}

pub fn catalog() -> Vec<CatalogEntry> {
    ServiceKind::ALL
        .into_iter()
        .map(|kind| CatalogEntry {
            name: kind,
            description: kind.description(),
            icon: kind.icon(),
            binding: kind.binding(),
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct Location {
    pub id: i32,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_service() {
        assert_eq!(ServiceKind::parse("Spiral Binding"), Some(ServiceKind::SpiralBinding));
        assert_eq!(ServiceKind::parse(" photo frames "), Some(ServiceKind::PhotoFrames));
        assert_eq!(ServiceKind::parse("Lamination"), None);
    }

    #[test]
    fn test_binding_mapping() {
        assert_eq!(ServiceKind::ThesisBinding.binding(), BindingKind::Thesis);
        assert_eq!(ServiceKind::CustomPrinting.binding(), BindingKind::None);
        assert_eq!(catalog().len(), 6);
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&ServiceKind::SoftBinding).unwrap();
        assert_eq!(json, "\"Soft Binding\"");
    }
}
