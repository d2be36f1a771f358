use std::fs::File;
use std::path::Path;

use calamine::{open_workbook, Reader, Xlsx};
use log::{error, info, warn};

use crate::error::{Error, Result};

/// Header names accepted for the cities column, compared case-insensitively.
const CITY_HEADERS: [&str; 3] = ["cities", "city", "multi cities"];

/// Loads target cities from a CSV or XLSX file, skipping blank cells.
pub fn load_cities<P: AsRef<Path>>(filename: P) -> Result<Vec<String>> {
    let path = filename.as_ref();
    if !path.exists() {
        error!("Cities file {:?} does not exist.", path);
        return Err(Error::Config(format!("cities file {:?} not found", path)));
    }

    let is_excel = path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("xlsx") || ext.eq_ignore_ascii_case("xls"));

    let cities = if is_excel { load_excel(path)? } else { load_csv(path)? };
    info!("Loaded {} cities from {:?}", cities.len(), path);
    Ok(cities)
}

fn load_csv(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(file);

    let headers = rdr.headers()?.clone();
    let Some(city_idx) = headers.iter().position(is_city_header) else {
        return Err(Error::Config(format!(
            "{:?} has no cities column (headers: {})",
            path,
            headers.iter().collect::<Vec<_>>().join(", ")
        )));
    };

    let mut cities = Vec::new();
    for result in rdr.records() {
        match result {
            Ok(record) => {
                if let Some(city) = record.get(city_idx).filter(|c| !c.is_empty()) {
                    cities.push(city.to_string());
                }
            }
            Err(e) => warn!("Skipping unreadable row in {:?}: {}", path, e),
        }
    }
    Ok(cities)
}

fn load_excel(path: &Path) -> Result<Vec<String>> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;

    let worksheets = workbook.worksheets();
    let Some((_name, range)) = worksheets.first() else {
        warn!("Workbook {:?} has no sheets", path);
        return Ok(Vec::new());
    };

    let mut rows = range.rows();
    let city_idx = rows
        .next()
        .and_then(|header| header.iter().position(|cell| is_city_header(&cell.to_string())));
    let Some(city_idx) = city_idx else {
        return Err(Error::Config(format!("{:?} has no cities column", path)));
    };

    let cities = rows
        .filter_map(|row| row.get(city_idx))
        .map(|cell| cell.to_string().trim().to_string())
        .filter(|city| !city.is_empty())
        .collect();
    Ok(cities)
}

fn is_city_header(header: &str) -> bool {
    let header = header.trim();
    CITY_HEADERS.iter().any(|known| header.eq_ignore_ascii_case(known))
}
