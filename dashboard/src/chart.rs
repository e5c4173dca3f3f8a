//! Vega-Lite description of the attempts bar chart.

use repcount_core::LongRecord;
use serde::Serialize;

pub const VEGA_LITE_SCHEMA: &str = "https://vega.github.io/schema/vega-lite/v5.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Temporal,
    Quantitative,
    Nominal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scale {
    pub scheme: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDef {
    pub field: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<Scale>,
}

impl FieldDef {
    pub fn new(field: &str, field_type: FieldType) -> Self {
        Self {
            field: field.to_string(),
            field_type,
            title: None,
            scale: None,
        }
    }

    pub fn titled(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn with_scheme(mut self, scheme: &str) -> Self {
        self.scale = Some(Scale {
            scheme: scheme.to_string(),
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Encoding {
    pub x: FieldDef,
    pub y: FieldDef,
    pub color: FieldDef,
    pub tooltip: Vec<FieldDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mark {
    #[serde(rename = "type")]
    pub mark_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InlineData {
    pub values: Vec<LongRecord>,
}

/// Interval selection bound to the scales: drag to pan, wheel to zoom.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Param {
    pub name: String,
    pub select: String,
    pub bind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    #[serde(rename = "$schema")]
    pub schema: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub width: String,
    pub height: u32,
    pub data: InlineData,
    pub mark: Mark,
    pub encoding: Encoding,
    pub params: Vec<Param>,
}

impl ChartSpec {
    /// Bars of repetitions over time, one colour per attempt.
    pub fn attempts_bar(records: &[LongRecord]) -> Self {
        Self {
            schema: VEGA_LITE_SCHEMA.to_string(),
            title: None,
            width: "container".to_string(),
            height: 400,
            data: InlineData {
                values: records.to_vec(),
            },
            mark: Mark {
                mark_type: "bar".to_string(),
            },
            encoding: Encoding {
                x: FieldDef::new("date", FieldType::Temporal).titled("Date"),
                y: FieldDef::new("value", FieldType::Quantitative).titled("Pushups"),
                color: FieldDef::new("attempt_label", FieldType::Nominal)
                    .titled("Try")
                    .with_scheme("category10"),
                tooltip: vec![
                    FieldDef::new("date", FieldType::Temporal),
                    FieldDef::new("attempt_label", FieldType::Nominal),
                    FieldDef::new("value", FieldType::Quantitative),
                ],
            },
            params: vec![Param {
                name: "grid".to_string(),
                select: "interval".to_string(),
                bind: "scales".to_string(),
            }],
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn point_count(&self) -> usize {
        self.data.values.len()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
