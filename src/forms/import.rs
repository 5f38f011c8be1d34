//! Uploaded files: CSV mass import and configuration documents.

use std::io::{Read, Seek};

use actix_multipart::form::{MultipartForm, tempfile::TempFile};

use crate::forms::FormError;

#[derive(MultipartForm)]
pub struct UploadCsvForm {
    #[multipart(limit = "10MB")]
    pub csv: TempFile,
}

impl UploadCsvForm {
    pub fn parse(&mut self) -> Result<CsvTable, FormError> {
        let file = self.csv.file.as_file_mut();
        file.rewind().map_err(|err| FormError::Malformed(err.to_string()))?;
        CsvTable::from_reader(file)
    }
}

#[derive(MultipartForm)]
pub struct UploadConfigForm {
    #[multipart(limit = "10MB")]
    pub config: TempFile,
}

impl UploadConfigForm {
    /// Raw JSON content of the uploaded document.
    pub fn read(&mut self) -> Result<String, FormError> {
        let mut content = String::new();
        let file = self.config.file.as_file_mut();
        file.rewind().map_err(|err| FormError::Malformed(err.to_string()))?;
        file.read_to_string(&mut content)
            .map_err(|err| FormError::Malformed(err.to_string()))?;
        Ok(content)
    }
}

/// Header row and records of an uploaded CSV file.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CsvTable {
    pub fn from_reader(reader: impl Read) -> Result<Self, FormError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = reader
            .headers()
            .map_err(|err| FormError::Csv(err.to_string()))?
            .iter()
            .map(str::to_string)
            .collect::<Vec<_>>();
        if headers.iter().all(String::is_empty) {
            return Err(FormError::Csv("the header row is missing".to_string()));
        }
        let rows = reader
            .records()
            .map(|record| {
                record
                    .map(|record| record.iter().map(str::to_string).collect())
                    .map_err(|err| FormError::Csv(err.to_string()))
            })
            .collect::<Result<Vec<Vec<String>>, _>>()?;
        Ok(Self { headers, rows })
    }

    /// Rows as `(header, value)` pairs, skipping empty cells.
    pub fn records(&self) -> impl Iterator<Item = Vec<(&str, &str)>> + '_ {
        self.rows.iter().map(|row| {
            self.headers
                .iter()
                .zip(row)
                .filter(|(_, value)| !value.is_empty())
                .map(|(header, value)| (header.as_str(), value.as_str()))
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_headers_and_rows() {
        let data = "last_name, first_name,Ship\nSpiegel,Spike,Bebop\nBlack,Jet,\n";
        let table = CsvTable::from_reader(data.as_bytes()).expect("valid csv");
        assert_eq!(table.headers, vec!["last_name", "first_name", "Ship"]);
        let records: Vec<_> = table.records().collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1], vec![("last_name", "Black"), ("first_name", "Jet")]);
    }

    #[test]
    fn empty_files_are_rejected() {
        assert!(CsvTable::from_reader("".as_bytes()).is_err());
    }
}
