//! Blank import workbook handed to admins so uploads arrive in the expected layout.

use crate::error::Result;
use crate::importer::import_columns;
use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook};
use std::path::Path;
use tracing::info;

pub const TEMPLATE_FILE_NAME: &str = "EAPCET_College_Data_Template.xlsx";
const MAX_COLUMN_WIDTH: usize = 50;

enum Sample {
    Text(&'static str),
    Number(f64),
}

use Sample::{Number as N, Text as T};

/// Three example rows, one value per column of the import layout.
fn sample_rows() -> [[Sample; 29]; 3] {
    [
        [
            T("AARM"), T("AAR MAHAVEER ENGINEERING COLLEGE"), T("BANDLAGUDA"), T("HYD"), T("COED"),
            T("PVT"), N(2010.0), T("CSE"), T("COMPUTER SCIENCE AND ENGINEERING"),
            N(26588.0), N(29938.0), N(52666.0), N(62471.0), N(38568.0), N(38568.0),
            N(26588.0), N(108434.0), N(38368.0), N(38368.0), N(53852.0), N(53852.0),
            N(70513.0), N(75671.0), N(70477.0), N(83930.0), N(30771.0), N(38034.0),
            N(60000.0), T("JNTUH"),
        ],
        [
            T("AARM"), T("AAR MAHAVEER ENGINEERING COLLEGE"), T("BANDLAGUDA"), T("HYD"), T("COED"),
            T("PVT"), N(2010.0), T("ECE"), T("ELECTRONICS AND COMMUNICATION ENGINEERING"),
            N(54242.0), N(54242.0), N(101521.0), N(101521.0), N(76946.0), N(85866.0),
            N(54242.0), N(54242.0), N(75251.0), N(82142.0), N(134835.0), N(134835.0),
            N(125763.0), N(125763.0), N(119658.0), N(174032.0), N(82588.0), N(82588.0),
            N(55000.0), T("JNTUH"),
        ],
        [
            T("COLLEGE2"), T("ANOTHER ENGINEERING COLLEGE"), T("HYDERABAD"), T("RNG"), T("COED"),
            T("PVT"), N(2015.0), T("CSE"), T("COMPUTER SCIENCE AND ENGINEERING"),
            N(15000.0), N(18000.0), N(25000.0), N(28000.0), N(22000.0), N(24000.0),
            N(20000.0), N(23000.0), N(21000.0), N(23500.0), N(30000.0), N(32000.0),
            N(45000.0), N(48000.0), N(44000.0), N(47000.0), N(19000.0), N(21000.0),
            N(50000.0), T("JNTUK"),
        ],
    ]
}

impl Sample {
    fn display_len(&self) -> usize {
        match self {
            Sample::Text(s) => s.len(),
            Sample::Number(n) => format!("{}", n).len(),
        }
    }
}

pub fn write_template(path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Template")?;

    let header_format = Format::new()
        .set_bold()
        .set_font_size(12)
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(0x366092))
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_text_wrap();

    let columns = import_columns();
    let rows = sample_rows();

    for (col, (label, _)) in columns.iter().enumerate() {
        let col = col as u16;
        worksheet.write_string_with_format(0, col, *label, &header_format)?;

        let widest = rows
            .iter()
            .map(|row| row[col as usize].display_len())
            .chain(std::iter::once(label.len()))
            .max()
            .unwrap_or(0);
        worksheet.set_column_width(col, ((widest + 2).min(MAX_COLUMN_WIDTH)) as f64)?;
    }

    for (r, row) in rows.iter().enumerate() {
        let r = (r + 1) as u32;
        for (col, value) in row.iter().enumerate() {
            match value {
                Sample::Text(s) => worksheet.write_string(r, col as u16, *s)?,
                Sample::Number(n) => worksheet.write_number(r, col as u16, *n)?,
            };
        }
    }

    worksheet.set_row_height(0, 25)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    workbook.save(path)?;
    info!(path = %path.display(), "wrote import template");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::DatasetBuilder;
    use crate::scraper::TableScraper;

    #[test]
    fn test_template_imports_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(TEMPLATE_FILE_NAME);
        write_template(&path).unwrap();

        let table = TableScraper::new().scrape_file(&path).unwrap();
        assert_eq!(table.headers.len(), 29);
        assert_eq!(table.headers[0], "Inst Code");
        assert_eq!(table.headers[28], "Affiliated To");
        assert_eq!(table.rows.len(), 3);

        let (institutes, summary) = DatasetBuilder::new(None).build(&[table]).unwrap();
        assert_eq!(summary.institutes, 2);
        assert_eq!(summary.branches, 3);
        assert_eq!(institutes[0].inst_code, "AARM");
        assert_eq!(institutes[0].branches[0].cutoffs.len(), 18);
        assert_eq!(institutes[1].branches[0].affiliated_to.as_deref(), Some("JNTUK"));
    }
}
