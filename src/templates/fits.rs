//! Minimal reader/writer for the FITS subset used by template files.
//!
//! A FITS file is a sequence of HDUs (header + data units). Each header is a
//! run of 80-character ASCII cards terminated by an `END` card and padded to a
//! multiple of 2880 bytes; the data that follows is big-endian and likewise
//! padded to a 2880-byte boundary.
//!
//! Only what templates need is supported:
//!
//! - primary HDU and `IMAGE` extensions (other extension data is skipped)
//! - keyword cards with logical, integer, float (`E` or `D` exponent) and
//!   quoted string values; commentary cards are ignored
//! - `BITPIX` of 8, 16, 32, 64, -32 and -64, with optional `BSCALE`/`BZERO`
//!
//! Data are always decoded into native-endian `f64`, so callers never see
//! foreign-endian buffers.

use std::fs;
use std::io::Write;
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::ZfindError;

const BLOCK: usize = 2880;
const CARD: usize = 80;

/// Value of a header keyword card.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Logical(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl HeaderValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HeaderValue::Int(v) => Some(*v as f64),
            HeaderValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            HeaderValue::Int(v) => Some(*v),
            HeaderValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    /// Logical value; numeric values count as true when non-zero.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HeaderValue::Logical(v) => Some(*v),
            HeaderValue::Int(v) => Some(*v != 0),
            HeaderValue::Float(v) => Some(*v != 0.0),
            HeaderValue::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::Str(s) => Some(s),
            _ => None,
        }
    }

    fn to_card_value(&self) -> String {
        match self {
            HeaderValue::Logical(v) => format!("{:>20}", if *v { "T" } else { "F" }),
            HeaderValue::Int(v) => format!("{v:>20}"),
            HeaderValue::Float(v) => format!("{:>20}", format!("{v:?}").to_uppercase()),
            HeaderValue::Str(s) => format!("'{:<8}'", s.replace('\'', "''")),
        }
    }
}

/// Ordered keyword cards of one HDU.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    cards: Vec<(String, HeaderValue)>,
}

impl Header {
    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        self.cards.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn push(&mut self, key: &str, value: HeaderValue) {
        self.cards.push((key.to_string(), value));
    }

    fn int(&self, key: &str) -> Result<i64, String> {
        self.get(key)
            .and_then(HeaderValue::as_i64)
            .ok_or_else(|| format!("missing or non-integer {key}"))
    }
}

/// One header-data unit with its data decoded to `f64`.
#[derive(Debug, Clone, PartialEq)]
pub struct Hdu {
    pub header: Header,
    /// `NAXIS1, NAXIS2, ...` (fastest-varying axis first).
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

impl Hdu {
    pub fn extname(&self) -> Option<&str> {
        self.header.get("EXTNAME").and_then(HeaderValue::as_str)
    }
}

/// Read every HDU of a FITS file.
pub fn read_fits(path: &Path) -> Result<Vec<Hdu>, ZfindError> {
    let bytes = fs::read(path).map_err(|e| ZfindError::io(path, e))?;
    parse_hdus(&bytes).map_err(|message| ZfindError::invalid_template(path, message))
}

/// Parse every HDU from an in-memory FITS image.
pub fn parse_hdus(bytes: &[u8]) -> Result<Vec<Hdu>, String> {
    let mut hdus = Vec::new();
    let mut offset = 0usize;

    while offset < bytes.len() {
        let (header, header_len) = parse_header(&bytes[offset..])?;
        offset += header_len;

        if hdus.is_empty() && header.get("SIMPLE").and_then(HeaderValue::as_bool) != Some(true) {
            return Err("not a FITS file (missing SIMPLE = T)".to_string());
        }

        let bitpix = header.int("BITPIX")?;
        let naxis = header.int("NAXIS")?;
        let mut shape = Vec::with_capacity(naxis.max(0) as usize);
        for i in 1..=naxis {
            let n = header.int(&format!("NAXIS{i}"))?;
            shape.push(usize::try_from(n).map_err(|_| format!("negative NAXIS{i}"))?);
        }
        let overflow = || "data unit size overflows".to_string();
        let count = if shape.is_empty() {
            0
        } else {
            shape
                .iter()
                .try_fold(1usize, |acc, n| acc.checked_mul(*n))
                .ok_or_else(overflow)?
        };
        let pcount = header.get("PCOUNT").and_then(HeaderValue::as_i64).unwrap_or(0).max(0) as usize;
        let gcount = header.get("GCOUNT").and_then(HeaderValue::as_i64).unwrap_or(1).max(1) as usize;
        let elem = bitpix.unsigned_abs() as usize / 8;
        let nbytes = if count == 0 {
            0
        } else {
            pcount
                .checked_add(count)
                .and_then(|n| n.checked_mul(gcount))
                .and_then(|n| n.checked_mul(elem))
                .ok_or_else(overflow)?
        };

        if nbytes > bytes.len() - offset {
            return Err(format!(
                "truncated data unit: need {nbytes} bytes, {} available",
                bytes.len().saturating_sub(offset)
            ));
        }

        let is_image = hdus.is_empty()
            || header
                .get("XTENSION")
                .and_then(HeaderValue::as_str)
                .is_some_and(|x| x.trim() == "IMAGE");
        let data = if is_image && count > 0 {
            decode(&bytes[offset..offset + elem * count], bitpix, &header)?
        } else {
            Vec::new()
        };

        offset += padded(nbytes);
        hdus.push(Hdu {
            header,
            shape,
            data,
        });
    }

    if hdus.is_empty() {
        return Err("empty file".to_string());
    }
    Ok(hdus)
}

fn padded(n: usize) -> usize {
    n.div_ceil(BLOCK) * BLOCK
}

fn parse_header(bytes: &[u8]) -> Result<(Header, usize), String> {
    let mut header = Header::default();
    let mut pos = 0usize;

    loop {
        if pos + CARD > bytes.len() {
            return Err("header is missing its END card".to_string());
        }
        let card = std::str::from_utf8(&bytes[pos..pos + CARD])
            .ok()
            .filter(|c| c.is_ascii())
            .ok_or_else(|| format!("non-ASCII header card at byte {pos}"))?;
        pos += CARD;

        let key = card[..8].trim_end();
        if key == "END" {
            break;
        }
        if &card[8..10] != "= " {
            // COMMENT, HISTORY and blank cards.
            continue;
        }
        let value = parse_value(&card[10..]).map_err(|e| format!("{key}: {e}"))?;
        header.push(key, value);
    }

    Ok((header, padded(pos)))
}

fn parse_value(raw: &str) -> Result<HeaderValue, String> {
    let raw = raw.trim_start();

    if let Some(rest) = raw.strip_prefix('\'') {
        let mut out = String::new();
        let mut chars = rest.chars().peekable();
        loop {
            match chars.next() {
                Some('\'') if chars.peek() == Some(&'\'') => {
                    chars.next();
                    out.push('\'');
                }
                Some('\'') => break,
                Some(c) => out.push(c),
                None => return Err("unterminated string".to_string()),
            }
        }
        return Ok(HeaderValue::Str(out.trim_end().to_string()));
    }

    let token = raw.split('/').next().unwrap_or("").trim();
    match token {
        "T" => return Ok(HeaderValue::Logical(true)),
        "F" => return Ok(HeaderValue::Logical(false)),
        "" => return Err("empty value".to_string()),
        _ => {}
    }
    if let Ok(v) = token.parse::<i64>() {
        return Ok(HeaderValue::Int(v));
    }
    token
        .replace(['D', 'd'], "E")
        .parse::<f64>()
        .map(HeaderValue::Float)
        .map_err(|_| format!("unparseable value '{token}'"))
}

fn decode(raw: &[u8], bitpix: i64, header: &Header) -> Result<Vec<f64>, String> {
    let bscale = header.get("BSCALE").and_then(HeaderValue::as_f64).unwrap_or(1.0);
    let bzero = header.get("BZERO").and_then(HeaderValue::as_f64).unwrap_or(0.0);
    let mut rdr = raw;
    let elem = bitpix.unsigned_abs() as usize / 8;
    let mut out = Vec::with_capacity(raw.len() / elem.max(1));

    let err = |e: std::io::Error| format!("data decode failed: {e}");
    while !rdr.is_empty() {
        let v = match bitpix {
            8 => rdr.read_u8().map_err(err)? as f64,
            16 => rdr.read_i16::<BigEndian>().map_err(err)? as f64,
            32 => rdr.read_i32::<BigEndian>().map_err(err)? as f64,
            64 => rdr.read_i64::<BigEndian>().map_err(err)? as f64,
            -32 => rdr.read_f32::<BigEndian>().map_err(err)? as f64,
            -64 => rdr.read_f64::<BigEndian>().map_err(err)?,
            other => return Err(format!("unsupported BITPIX {other}")),
        };
        out.push(v * bscale + bzero);
    }
    Ok(out)
}

/// Write a FITS file with an empty primary HDU and one 2-D `f64` image
/// extension of `nrows × ncols` values given in row-major order.
pub fn write_image_fits(
    path: &Path,
    extname: &str,
    nrows: usize,
    ncols: usize,
    data: &[f64],
    extra: &Header,
) -> Result<(), ZfindError> {
    if data.len() != nrows * ncols {
        return Err(ZfindError::InvalidArgument(format!(
            "image data has {} values, expected {nrows}x{ncols}",
            data.len()
        )));
    }

    let mut primary = Header::default();
    primary.push("SIMPLE", HeaderValue::Logical(true));
    primary.push("BITPIX", HeaderValue::Int(8));
    primary.push("NAXIS", HeaderValue::Int(0));
    primary.push("EXTEND", HeaderValue::Logical(true));

    let mut image = Header::default();
    image.push("XTENSION", HeaderValue::Str("IMAGE".to_string()));
    image.push("BITPIX", HeaderValue::Int(-64));
    image.push("NAXIS", HeaderValue::Int(2));
    image.push("NAXIS1", HeaderValue::Int(ncols as i64));
    image.push("NAXIS2", HeaderValue::Int(nrows as i64));
    image.push("PCOUNT", HeaderValue::Int(0));
    image.push("GCOUNT", HeaderValue::Int(1));
    image.push("EXTNAME", HeaderValue::Str(extname.to_string()));
    for (key, value) in &extra.cards {
        image.push(key, value.clone());
    }

    let mut out = Vec::new();
    encode_header(&primary, &mut out)?;
    encode_header(&image, &mut out)?;
    for &v in data {
        out.write_f64::<BigEndian>(v)
            .map_err(|e| ZfindError::io(path, e))?;
    }
    out.resize(padded(out.len()), 0);

    let mut file = fs::File::create(path).map_err(|e| ZfindError::io(path, e))?;
    file.write_all(&out).map_err(|e| ZfindError::io(path, e))?;
    Ok(())
}

fn encode_header(header: &Header, out: &mut Vec<u8>) -> Result<(), ZfindError> {
    let start = out.len();
    for (key, value) in &header.cards {
        if key.len() > 8 {
            return Err(ZfindError::InvalidArgument(format!("FITS keyword too long: {key}")));
        }
        let card = format!("{key:<8}= {}", value.to_card_value());
        if card.len() > CARD || !card.is_ascii() {
            return Err(ZfindError::InvalidArgument(format!("FITS card too long: {key}")));
        }
        out.extend_from_slice(format!("{card:<80}").as_bytes());
    }
    out.extend_from_slice(format!("{:<80}", "END").as_bytes());
    let len = out.len() - start;
    out.resize(start + padded(len), b' ');
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_value_variants() {
        assert_eq!(parse_value("                   T / flag").unwrap(), HeaderValue::Logical(true));
        assert_eq!(parse_value("                 42").unwrap(), HeaderValue::Int(42));
        assert_eq!(parse_value("  1.5D-3 / double").unwrap(), HeaderValue::Float(1.5e-3));
        assert_eq!(
            parse_value("'GALAXY  '           / type").unwrap(),
            HeaderValue::Str("GALAXY".to_string())
        );
        assert_eq!(parse_value("'it''s'").unwrap(), HeaderValue::Str("it's".to_string()));
        assert!(parse_value("'open").is_err());
    }

    #[test]
    fn write_then_read_image_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.fits");
        let mut extra = Header::default();
        extra.push("CRVAL1", HeaderValue::Float(3.5));
        extra.push("RRTYPE", HeaderValue::Str("QSO".to_string()));

        let data: Vec<f64> = (0..6).map(|i| i as f64 * 0.25 - 1.0).collect();
        write_image_fits(&path, "BASIS_VECTORS", 2, 3, &data, &extra).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len() % BLOCK, 0);

        let hdus = read_fits(&path).unwrap();
        assert_eq!(hdus.len(), 2);
        let img = &hdus[1];
        assert_eq!(img.extname(), Some("BASIS_VECTORS"));
        assert_eq!(img.shape, vec![3, 2]);
        assert_eq!(img.data, data);
        assert_eq!(img.header.get("CRVAL1").and_then(HeaderValue::as_f64), Some(3.5));
    }

    #[test]
    fn decodes_scaled_integers() {
        let mut header = Header::default();
        header.push("BSCALE", HeaderValue::Float(0.5));
        header.push("BZERO", HeaderValue::Int(10));
        let raw = [0x00, 0x02, 0xFF, 0xFE];
        assert_eq!(decode(&raw, 16, &header).unwrap(), vec![11.0, 9.0]);
    }

    #[test]
    fn oversized_axes_are_an_error() {
        let mut header = Header::default();
        header.push("SIMPLE", HeaderValue::Logical(true));
        header.push("BITPIX", HeaderValue::Int(-64));
        header.push("NAXIS", HeaderValue::Int(2));
        header.push("NAXIS1", HeaderValue::Int(i64::MAX));
        header.push("NAXIS2", HeaderValue::Int(4));
        let mut bytes = Vec::new();
        encode_header(&header, &mut bytes).unwrap();

        let err = parse_hdus(&bytes).unwrap_err();
        assert!(err.contains("overflows"), "{err}");
    }

    #[test]
    fn rejects_non_fits_bytes() {
        let mut bytes = format!("{:<80}{:<80}", "SIMPLE  =                    F", "END").into_bytes();
        bytes.resize(BLOCK, b' ');
        assert!(parse_hdus(&bytes).is_err());
    }
}
