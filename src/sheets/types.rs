//! Wire shapes for the spreadsheet REST API.
//!
//! Mutations are either `values` range writes or a `batchUpdate` list of
//! named structural operations; only the operations this service issues are
//! modeled.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ===== values.* =====

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ValueRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub major_dimension: Option<String>,
    #[serde(default)]
    pub values: Vec<Vec<Value>>,
}

/// How written values are interpreted by the backend. `UserEntered` parses
/// formulas and locale-formatted numbers like a typed-in cell would.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueInputMode {
    Raw,
    UserEntered,
}

impl ValueInputMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueInputMode::Raw => "RAW",
            ValueInputMode::UserEntered => "USER_ENTERED",
        }
    }
}

// ===== spreadsheet metadata =====

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SpreadsheetMeta {
    #[serde(default)]
    pub properties: SpreadsheetProperties,
    #[serde(default)]
    pub sheets: Vec<SheetMeta>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SpreadsheetProperties {
    #[serde(default)]
    pub locale: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SheetMeta {
    #[serde(default)]
    pub properties: SheetProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SheetProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid_properties: Option<GridProperties>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GridProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frozen_row_count: Option<i64>,
}

// ===== batchUpdate request union =====

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BatchUpdateBody {
    pub requests: Vec<Request>,
}

/// One named structural operation. Exactly one member is set per request;
/// the backend applies the list in order within a single call.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub add_sheet: Option<AddSheetRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_sheet: Option<DeleteSheetRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insert_dimension: Option<InsertDimensionRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat_cell: Option<RepeatCellRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_range: Option<SortRangeRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_borders: Option<UpdateBordersRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_sheet_properties: Option<UpdateSheetPropertiesRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_dimension_properties: Option<UpdateDimensionPropertiesRequest>,
}

impl Request {
    pub fn add_sheet(title: &str) -> Self {
        Request {
            add_sheet: Some(AddSheetRequest {
                properties: SheetProperties {
                    title: Some(title.to_string()),
                    ..Default::default()
                },
            }),
            ..Default::default()
        }
    }

    pub fn delete_sheet(sheet_id: i64) -> Self {
        Request {
            delete_sheet: Some(DeleteSheetRequest { sheet_id }),
            ..Default::default()
        }
    }

    pub fn insert_columns(sheet_id: i64, start: i64, count: i64) -> Self {
        Request {
            insert_dimension: Some(InsertDimensionRequest {
                range: DimensionRange {
                    sheet_id,
                    dimension: "COLUMNS".to_string(),
                    start_index: start,
                    end_index: start + count,
                },
                inherit_from_before: Some(true),
            }),
            ..Default::default()
        }
    }

    pub fn insert_rows(sheet_id: i64, start: i64, count: i64) -> Self {
        Request {
            insert_dimension: Some(InsertDimensionRequest {
                range: DimensionRange {
                    sheet_id,
                    dimension: "ROWS".to_string(),
                    start_index: start,
                    end_index: start + count,
                },
                inherit_from_before: Some(true),
            }),
            ..Default::default()
        }
    }

    pub fn freeze_rows(sheet_id: i64, rows: i64) -> Self {
        Request {
            update_sheet_properties: Some(UpdateSheetPropertiesRequest {
                properties: SheetProperties {
                    sheet_id: Some(sheet_id),
                    grid_properties: Some(GridProperties {
                        frozen_row_count: Some(rows),
                    }),
                    ..Default::default()
                },
                fields: "gridProperties.frozenRowCount".to_string(),
            }),
            ..Default::default()
        }
    }

    pub fn column_width(sheet_id: i64, col: i64, pixels: i64) -> Self {
        Request {
            update_dimension_properties: Some(UpdateDimensionPropertiesRequest {
                range: DimensionRange {
                    sheet_id,
                    dimension: "COLUMNS".to_string(),
                    start_index: col,
                    end_index: col + 1,
                },
                properties: DimensionProperties {
                    pixel_size: Some(pixels),
                    hidden_by_user: None,
                },
                fields: "pixelSize".to_string(),
            }),
            ..Default::default()
        }
    }

    pub fn hide_column(sheet_id: i64, col: i64) -> Self {
        Request {
            update_dimension_properties: Some(UpdateDimensionPropertiesRequest {
                range: DimensionRange {
                    sheet_id,
                    dimension: "COLUMNS".to_string(),
                    start_index: col,
                    end_index: col + 1,
                },
                properties: DimensionProperties {
                    pixel_size: None,
                    hidden_by_user: Some(true),
                },
                fields: "hiddenByUser".to_string(),
            }),
            ..Default::default()
        }
    }

    pub fn number_format(range: GridRange, pattern_type: &str, pattern: &str) -> Self {
        Request {
            repeat_cell: Some(RepeatCellRequest {
                range,
                cell: CellData {
                    user_entered_format: Some(CellFormat {
                        number_format: Some(NumberFormat {
                            format_type: pattern_type.to_string(),
                            pattern: pattern.to_string(),
                        }),
                        text_format: None,
                    }),
                },
                fields: "userEnteredFormat.numberFormat".to_string(),
            }),
            ..Default::default()
        }
    }

    pub fn bold(range: GridRange) -> Self {
        Request {
            repeat_cell: Some(RepeatCellRequest {
                range,
                cell: CellData {
                    user_entered_format: Some(CellFormat {
                        number_format: None,
                        text_format: Some(TextFormat { bold: Some(true) }),
                    }),
                },
                fields: "userEnteredFormat.textFormat.bold".to_string(),
            }),
            ..Default::default()
        }
    }

    pub fn sort(range: GridRange, specs: Vec<SortSpec>) -> Self {
        Request {
            sort_range: Some(SortRangeRequest {
                range,
                sort_specs: specs,
            }),
            ..Default::default()
        }
    }

    pub fn border_top(range: GridRange) -> Self {
        Request {
            update_borders: Some(UpdateBordersRequest {
                range,
                top: Some(Border {
                    style: "SOLID".to_string(),
                    width: Some(1),
                }),
                bottom: None,
            }),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddSheetRequest {
    pub properties: SheetProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSheetRequest {
    pub sheet_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertDimensionRequest {
    pub range: DimensionRange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inherit_from_before: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionRange {
    pub sheet_id: i64,
    pub dimension: String,
    pub start_index: i64,
    pub end_index: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pixel_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden_by_user: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDimensionPropertiesRequest {
    pub range: DimensionRange,
    pub properties: DimensionProperties,
    pub fields: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSheetPropertiesRequest {
    pub properties: SheetProperties,
    pub fields: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GridRange {
    pub sheet_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_row_index: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_row_index: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_column_index: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_column_index: Option<i64>,
}

impl GridRange {
    pub fn new(sheet_id: i64, rows: std::ops::Range<i64>, cols: std::ops::Range<i64>) -> Self {
        GridRange {
            sheet_id,
            start_row_index: Some(rows.start),
            end_row_index: Some(rows.end),
            start_column_index: Some(cols.start),
            end_column_index: Some(cols.end),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepeatCellRequest {
    pub range: GridRange,
    pub cell: CellData,
    pub fields: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_entered_format: Option<CellFormat>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellFormat {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_format: Option<NumberFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_format: Option<TextFormat>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberFormat {
    #[serde(rename = "type")]
    pub format_type: String,
    pub pattern: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextFormat {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortRangeRequest {
    pub range: GridRange,
    pub sort_specs: Vec<SortSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortSpec {
    pub dimension_index: i64,
    pub sort_order: String,
}

impl SortSpec {
    pub fn ascending(col: i64) -> Self {
        SortSpec {
            dimension_index: col,
            sort_order: "ASCENDING".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBordersRequest {
    pub range: GridRange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<Border>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bottom: Option<Border>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Border {
    pub style: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_single_member() {
        let req = Request::add_sheet("Abrechnung u1 2025-03");
        let json = serde_json::to_value(&req).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 1);
        assert_eq!(
            json["addSheet"]["properties"]["title"],
            "Abrechnung u1 2025-03"
        );
    }

    #[test]
    fn insert_columns_shape() {
        let req = Request::insert_columns(3, 12, 1);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["insertDimension"]["range"]["dimension"], "COLUMNS");
        assert_eq!(json["insertDimension"]["range"]["startIndex"], 12);
        assert_eq!(json["insertDimension"]["range"]["endIndex"], 13);
    }

    #[test]
    fn number_format_uses_renamed_type_field() {
        let req = Request::number_format(GridRange::new(0, 3..100, 1..2), "DATE", "dd.mm.yyyy");
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json["repeatCell"]["cell"]["userEnteredFormat"]["numberFormat"]["type"],
            "DATE"
        );
    }
}
