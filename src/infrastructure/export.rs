use crate::domain::error::{AppError, Result};
use crate::domain::test_case::{Steps, TestCase};
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};

pub const SHEET_NAME: &str = "Test Cases";
pub const EXPORT_FILE_NAME: &str = "test_cases.xlsx";

const BASE_COLUMNS: [&str; 4] = ["id", "title", "steps", "expected_result"];

fn generated_flag(test_case: &TestCase) -> Option<bool> {
    test_case.generated
}

fn regenerated_flag(test_case: &TestCase) -> Option<bool> {
    test_case.regenerated
}

/// Flag columns appear only when some row carries the flag.
const FLAG_COLUMNS: [(&str, fn(&TestCase) -> Option<bool>); 2] = [
    ("generated", generated_flag),
    ("regenerated", regenerated_flag),
];

fn present_flags(test_cases: &[TestCase]) -> Vec<(&'static str, fn(&TestCase) -> Option<bool>)> {
    FLAG_COLUMNS
        .into_iter()
        .filter(|(_, flag)| test_cases.iter().any(|test_case| flag(test_case).is_some()))
        .collect()
}

pub fn export_columns(test_cases: &[TestCase]) -> Vec<&'static str> {
    BASE_COLUMNS
        .into_iter()
        .chain(present_flags(test_cases).into_iter().map(|(name, _)| name))
        .collect()
}

fn xlsx_error(err: XlsxError) -> AppError {
    AppError::StorageError(format!("Failed to build workbook: {}", err))
}

/// Numbered "step → expected" lines; raw step strings are written as-is.
pub fn render_steps(steps: &Steps) -> String {
    match steps {
        Steps::Raw(text) => text.clone(),
        Steps::Structured(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                if item.expected.is_empty() {
                    format!("{}. {}", index + 1, item.step)
                } else {
                    format!("{}. {} → {}", index + 1, item.step, item.expected)
                }
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn write_flag(sheet: &mut Worksheet, row: u32, col: u16, flag: Option<bool>) -> Result<()> {
    if let Some(flag) = flag {
        sheet.write_boolean(row, col, flag).map_err(xlsx_error)?;
    }
    Ok(())
}

/// Renders the working set as a single-sheet workbook. `story_id` is not exported.
pub fn test_cases_workbook(test_cases: &[TestCase]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let wrapped = Format::new().set_text_wrap();

    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME).map_err(xlsx_error)?;

    let flags = present_flags(test_cases);
    for (col, name) in export_columns(test_cases).iter().enumerate() {
        sheet
            .write_string_with_format(0, col as u16, *name, &header)
            .map_err(xlsx_error)?;
    }

    for (index, test_case) in test_cases.iter().enumerate() {
        let row = index as u32 + 1;
        sheet
            .write_number(row, 0, test_case.id as f64)
            .map_err(xlsx_error)?;
        sheet
            .write_string(row, 1, &test_case.title)
            .map_err(xlsx_error)?;
        sheet
            .write_string_with_format(row, 2, render_steps(&test_case.steps), &wrapped)
            .map_err(xlsx_error)?;
        sheet
            .write_string(row, 3, &test_case.expected_result)
            .map_err(xlsx_error)?;
        for (offset, (_, flag)) in flags.iter().enumerate() {
            let col = (BASE_COLUMNS.len() + offset) as u16;
            write_flag(sheet, row, col, flag(test_case))?;
        }
    }

    sheet.set_column_width(1, 40).map_err(xlsx_error)?;
    sheet.set_column_width(2, 60).map_err(xlsx_error)?;
    sheet.set_column_width(3, 40).map_err(xlsx_error)?;

    workbook.save_to_buffer().map_err(xlsx_error)
}
