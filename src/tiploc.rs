use crate::cif_fields::{
    expect_record_type, field, produce_cif_error_closure, read_optional_number,
    read_optional_string, slice_and_trim, CifError, CifErrorType, CifLine,
};
use crate::error::Error;
use crate::nr_json::{
    json_string, produce_nr_json_error_closure, NrJsonError, NrJsonRecord, NrJsonTiploc,
};
use crate::parser::ModificationType;

use std::cmp::Ordering;

/// Timing point location.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tiploc {
    pub tiploc: String,
    pub capitals: Option<u8>,
    pub nlc: Option<u32>,
    pub nlc_check_char: Option<String>,
    pub tps_description: Option<String>,
    pub stanox: Option<u32>,
    pub po_mcp_code: Option<u16>,
    pub crs: Option<String>,
    pub nlc_description: Option<String>,
}

impl Tiploc {
    pub fn new(tiploc: &str) -> Self {
        Tiploc {
            tiploc: tiploc.to_string(),
            ..Default::default()
        }
    }

    /// Reads any of the insert, amend and delete records. For an amend this
    /// is the location under its existing code, see [`Tiploc::amend_from_cif`].
    pub fn from_cif(line: &str) -> Result<Tiploc, CifError> {
        expect_record_type(line, &["TI", "TA", "TD"])?;

        Ok(Tiploc {
            tiploc: slice_and_trim(line, 2, 9),
            capitals: read_optional_number(field(line, 9, 11), produce_cif_error_closure(9))?,
            nlc: read_optional_number(field(line, 11, 17), produce_cif_error_closure(11))?,
            nlc_check_char: read_optional_string(field(line, 17, 18)),
            tps_description: read_optional_string(field(line, 18, 44)),
            stanox: read_optional_number(field(line, 44, 49), produce_cif_error_closure(44))?,
            po_mcp_code: read_optional_number(field(line, 49, 53), produce_cif_error_closure(49))?,
            crs: read_optional_string(field(line, 53, 56)),
            nlc_description: read_optional_string(field(line, 56, 72)),
        })
    }

    /// Returns the code being amended along with the amended location, which
    /// carries the new code when the record renames it.
    pub fn amend_from_cif(line: &str) -> Result<(String, Tiploc), CifError> {
        expect_record_type(line, &["TA"])?;
        let mut tiploc = Tiploc::from_cif(line)?;
        let old_tiploc = tiploc.tiploc.clone();
        if let Some(x) = read_optional_string(field(line, 72, 79)) {
            tiploc.tiploc = x;
        }
        Ok((old_tiploc, tiploc))
    }

    fn cif_line(&self, record_type: &str, code: &str) -> CifLine {
        let mut line = CifLine::new(record_type);
        line.text(2, 7, Some(code))
            .zero_filled(9, 2, self.capitals)
            .zero_filled(11, 6, self.nlc)
            .text(17, 1, self.nlc_check_char.as_deref())
            .text(18, 26, self.tps_description.as_deref())
            .zero_filled(44, 5, self.stanox)
            .number(49, 4, self.po_mcp_code)
            .text(53, 3, self.crs.as_deref())
            .text(56, 16, self.nlc_description.as_deref());
        line
    }

    pub fn to_cif(&self) -> String {
        self.cif_line("TI", &self.tiploc).finish()
    }

    pub fn to_cif_amend(&self, old_tiploc: &str) -> String {
        let mut line = self.cif_line("TA", old_tiploc);
        if old_tiploc != self.tiploc {
            line.text(72, 7, Some(&self.tiploc));
        }
        line.finish()
    }

    pub fn to_cif_delete(tiploc: &str) -> String {
        CifLine::new("TD").text(2, 7, Some(tiploc)).finish()
    }

    pub fn from_nr_json(json: &NrJsonTiploc) -> Result<Tiploc, NrJsonError> {
        let nalco = json.nalco.clone().unwrap_or_default();
        let stanox = json.stanox.clone().unwrap_or_default();
        Ok(Tiploc {
            tiploc: json.tiploc_code.trim_end().to_string(),
            nlc: read_optional_number(&nalco, produce_nr_json_error_closure("nalco"))?,
            stanox: read_optional_number(&stanox, produce_nr_json_error_closure("stanox"))?,
            crs: json_string(&json.crs_code),
            nlc_description: json_string(&json.description),
            tps_description: json_string(&json.tps_description),
            ..Default::default()
        })
    }

    pub fn from_json(line: &str) -> Result<Tiploc, Error> {
        match serde_json::from_str::<NrJsonRecord>(line)? {
            NrJsonRecord::Tiploc(x) => Ok(Tiploc::from_nr_json(&x)?),
            _ => Err(Error::NrJsonError(NrJsonError::new(
                CifErrorType::InvalidRecordType(line.chars().take(20).collect()),
                "TiplocV1",
            ))),
        }
    }

    pub fn to_nr_json(&self, transaction_type: ModificationType) -> NrJsonTiploc {
        NrJsonTiploc {
            transaction_type: transaction_type.json_name().to_string(),
            tiploc_code: self.tiploc.clone(),
            nalco: self.nlc.map(|x| format!("{:06}", x)),
            stanox: self.stanox.map(|x| format!("{:05}", x)),
            crs_code: self.crs.clone(),
            description: self.nlc_description.clone(),
            tps_description: self.tps_description.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&NrJsonRecord::Tiploc(self.to_nr_json(ModificationType::Insert)))
    }

    pub fn key(&self) -> &str {
        &self.tiploc
    }

    pub fn natural_cmp(&self, other: &Tiploc) -> Ordering {
        self.tiploc.cmp(&other.tiploc)
    }
}
