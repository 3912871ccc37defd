//! Named tables of fixed-schema records attached to a cube.
//!
//! A table is described in the cube label by an `Object = Table` holding
//! `Name`, `StartByte`, `Bytes`, `Records`, `ByteOrder`, any association
//! keywords, and one `Group = Field` per field. Record bytes are stored as
//! a contiguous blob in the table's byte order.

use cube_common::{ByteOrder, CubeError, Result};
use label::{Container, Keyword, Traverse, Value};

/// Field element types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Integer,
    Double,
    Real,
    Text,
    Byte,
}

impl FieldType {
    /// Bytes per element.
    pub fn width(&self) -> usize {
        match self {
            Self::Integer | Self::Real => 4,
            Self::Double => 8,
            Self::Text | Self::Byte => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Integer => "Integer",
            Self::Double => "Double",
            Self::Real => "Real",
            Self::Text => "Text",
            Self::Byte => "Byte",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "integer" => Ok(Self::Integer),
            "double" => Ok(Self::Double),
            "real" => Ok(Self::Real),
            "text" => Ok(Self::Text),
            "byte" => Ok(Self::Byte),
            other => Err(CubeError::parse(format!("unknown table field type '{other}'"))),
        }
    }
}

/// Schema entry: `size` elements of `field_type` (characters for text).
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub field_type: FieldType,
    pub size: usize,
}

impl FieldDef {
    pub fn new(name: &str, field_type: FieldType, size: usize) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            size,
        }
    }

    pub fn bytes(&self) -> usize {
        self.field_type.width() * self.size
    }
}

/// One field of one record.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Integer(Vec<i32>),
    Double(Vec<f64>),
    Real(Vec<f32>),
    Text(String),
    Byte(Vec<u8>),
}

impl FieldValue {
    fn matches(&self, def: &FieldDef) -> bool {
        match self {
            Self::Integer(v) => def.field_type == FieldType::Integer && v.len() == def.size,
            Self::Double(v) => def.field_type == FieldType::Double && v.len() == def.size,
            Self::Real(v) => def.field_type == FieldType::Real && v.len() == def.size,
            Self::Text(s) => def.field_type == FieldType::Text && s.len() <= def.size,
            Self::Byte(v) => def.field_type == FieldType::Byte && v.len() == def.size,
        }
    }

    /// First numeric element as f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(v) => v.first().map(|x| *x as f64),
            Self::Double(v) => v.first().copied(),
            Self::Real(v) => v.first().map(|x| *x as f64),
            Self::Byte(v) => v.first().map(|x| *x as f64),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.trim_end_matches('\0')),
            _ => None,
        }
    }
}

pub type Record = Vec<FieldValue>;

/// A named table.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    fields: Vec<FieldDef>,
    records: Vec<Record>,
    /// Extra keywords kept on the table's label object.
    pub keywords: Vec<Keyword>,
}

impl Table {
    pub fn new(name: &str, fields: Vec<FieldDef>) -> Self {
        Self {
            name: name.to_string(),
            fields,
            records: Vec::new(),
            keywords: Vec::new(),
        }
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Bytes per record.
    pub fn record_bytes(&self) -> usize {
        self.fields.iter().map(FieldDef::bytes).sum()
    }

    pub fn field_index(&self, name: &str) -> Result<usize> {
        self.fields
            .iter()
            .position(|f| f.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| CubeError::not_found(format!("table {} has no field {}", self.name, name)))
    }

    /// Append a record after checking it against the schema.
    pub fn add_record(&mut self, record: Record) -> Result<()> {
        if record.len() != self.fields.len() {
            return Err(CubeError::bad_argument(format!(
                "record has {} fields, table {} has {}",
                record.len(),
                self.name,
                self.fields.len()
            )));
        }
        for (value, def) in record.iter().zip(&self.fields) {
            if !value.matches(def) {
                return Err(CubeError::bad_argument(format!(
                    "value {:?} does not fit field {} ({} x {})",
                    value,
                    def.name,
                    def.field_type.as_str(),
                    def.size
                )));
            }
        }
        self.records.push(record);
        Ok(())
    }

    /// Serialize every record.
    pub fn to_bytes(&self, order: ByteOrder) -> Vec<u8> {
        let msb = order == ByteOrder::Msb;
        let mut out = Vec::with_capacity(self.record_bytes() * self.records.len());
        for record in &self.records {
            for (value, def) in record.iter().zip(&self.fields) {
                match value {
                    FieldValue::Integer(v) => {
                        for x in v {
                            out.extend_from_slice(&if msb { x.to_be_bytes() } else { x.to_le_bytes() });
                        }
                    }
                    FieldValue::Double(v) => {
                        for x in v {
                            out.extend_from_slice(&if msb { x.to_be_bytes() } else { x.to_le_bytes() });
                        }
                    }
                    FieldValue::Real(v) => {
                        for x in v {
                            out.extend_from_slice(&if msb { x.to_be_bytes() } else { x.to_le_bytes() });
                        }
                    }
                    FieldValue::Text(s) => {
                        let mut bytes = s.as_bytes().to_vec();
                        bytes.resize(def.size, 0);
                        out.extend_from_slice(&bytes);
                    }
                    FieldValue::Byte(v) => out.extend_from_slice(v),
                }
            }
        }
        out
    }

    /// Decode `count` records from `bytes`.
    pub fn from_bytes(
        name: &str,
        fields: Vec<FieldDef>,
        bytes: &[u8],
        count: usize,
        order: ByteOrder,
    ) -> Result<Self> {
        let mut table = Table::new(name, fields);
        let record_bytes = table.record_bytes();
        if bytes.len() < record_bytes * count {
            return Err(CubeError::parse(format!(
                "table {} needs {} bytes for {} records, found {}",
                name,
                record_bytes * count,
                count,
                bytes.len()
            )));
        }
        let msb = order == ByteOrder::Msb;
        for r in 0..count {
            let mut offset = r * record_bytes;
            let mut record = Vec::with_capacity(table.fields.len());
            for def in &table.fields {
                let raw = &bytes[offset..offset + def.bytes()];
                let value = match def.field_type {
                    FieldType::Integer => FieldValue::Integer(
                        raw.chunks_exact(4)
                            .map(|c| {
                                let b = [c[0], c[1], c[2], c[3]];
                                if msb { i32::from_be_bytes(b) } else { i32::from_le_bytes(b) }
                            })
                            .collect(),
                    ),
                    FieldType::Real => FieldValue::Real(
                        raw.chunks_exact(4)
                            .map(|c| {
                                let b = [c[0], c[1], c[2], c[3]];
                                if msb { f32::from_be_bytes(b) } else { f32::from_le_bytes(b) }
                            })
                            .collect(),
                    ),
                    FieldType::Double => FieldValue::Double(
                        raw.chunks_exact(8)
                            .map(|c| {
                                let mut b = [0u8; 8];
                                b.copy_from_slice(c);
                                if msb { f64::from_be_bytes(b) } else { f64::from_le_bytes(b) }
                            })
                            .collect(),
                    ),
                    FieldType::Text => FieldValue::Text(
                        String::from_utf8_lossy(raw).trim_end_matches('\0').to_string(),
                    ),
                    FieldType::Byte => FieldValue::Byte(raw.to_vec()),
                };
                record.push(value);
                offset += def.bytes();
            }
            table.records.push(record);
        }
        Ok(table)
    }

    /// Label object describing this table's blob.
    pub fn to_label_object(&self, start_byte: u64, bytes: usize, order: ByteOrder) -> Container {
        let mut object = Container::new("Table");
        object.add_keyword(Keyword::new("Name", self.name.as_str()));
        object.add_keyword(Keyword::new("StartByte", start_byte.to_string()));
        object.add_keyword(Keyword::new("Bytes", bytes.to_string()));
        object.add_keyword(Keyword::new("Records", self.records.len().to_string()));
        object.add_keyword(Keyword::new("ByteOrder", order.as_str()));
        for k in &self.keywords {
            object.add_keyword(k.clone());
        }
        for def in &self.fields {
            let mut field = Container::new("Field");
            field.add_keyword(Keyword::new("Name", Value::new(def.name.as_str())));
            field.add_keyword(Keyword::new("Type", def.field_type.as_str()));
            field.add_keyword(Keyword::new("Size", def.size.to_string()));
            object.add_group(field);
        }
        object
    }

    /// Read the schema and blob location from a table label object.
    pub fn describe(object: &Container) -> Result<TableDescriptor> {
        let name = object.keyword_value("Name", Traverse::CurrentLevel)?.to_string();
        let start_byte = object.keyword("StartByte", Traverse::CurrentLevel)?.as_i64(0)? as u64;
        let bytes = object.keyword("Bytes", Traverse::CurrentLevel)?.as_i64(0)? as usize;
        let records = object.keyword("Records", Traverse::CurrentLevel)?.as_i64(0)? as usize;
        let order = match object.keyword_value("ByteOrder", Traverse::CurrentLevel) {
            Ok(o) => ByteOrder::from_name(o)?,
            Err(_) => ByteOrder::Lsb,
        };
        let mut fields = Vec::new();
        for group in object.groups().filter(|g| g.is_named("Field")) {
            fields.push(FieldDef {
                name: group.keyword_value("Name", Traverse::CurrentLevel)?.to_string(),
                field_type: FieldType::from_name(group.keyword_value("Type", Traverse::CurrentLevel)?)?,
                size: group.keyword("Size", Traverse::CurrentLevel)?.as_i64(0)? as usize,
            });
        }
        let reserved = ["Name", "StartByte", "Bytes", "Records", "ByteOrder"];
        let keywords = object
            .keywords()
            .filter(|k| !reserved.iter().any(|r| k.is_named(r)))
            .cloned()
            .collect();
        Ok(TableDescriptor {
            name,
            fields,
            start_byte,
            bytes,
            records,
            order,
            keywords,
        })
    }
}

/// Location and schema of a table blob, read from its label object.
#[derive(Debug, Clone)]
pub struct TableDescriptor {
    pub name: String,
    pub fields: Vec<FieldDef>,
    pub start_byte: u64,
    pub bytes: usize,
    pub records: usize,
    pub order: ByteOrder,
    pub keywords: Vec<Keyword>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reseaus() -> Table {
        let mut t = Table::new(
            "Reseaus",
            vec![
                FieldDef::new("Sample", FieldType::Double, 1),
                FieldDef::new("Line", FieldType::Double, 1),
                FieldDef::new("Type", FieldType::Integer, 1),
                FieldDef::new("Valid", FieldType::Integer, 1),
                FieldDef::new("Note", FieldType::Text, 8),
            ],
        );
        t.add_record(vec![
            FieldValue::Double(vec![12.5]),
            FieldValue::Double(vec![40.0]),
            FieldValue::Integer(vec![5]),
            FieldValue::Integer(vec![1]),
            FieldValue::Text("edge".into()),
        ])
        .unwrap();
        t
    }

    #[test]
    fn test_record_validation() {
        let mut t = reseaus();
        let err = t
            .add_record(vec![FieldValue::Integer(vec![1])])
            .unwrap_err();
        assert_eq!(err.kind(), cube_common::ErrorKind::BadArgument);
        let err = t
            .add_record(vec![
                FieldValue::Real(vec![1.0]),
                FieldValue::Double(vec![1.0]),
                FieldValue::Integer(vec![1]),
                FieldValue::Integer(vec![1]),
                FieldValue::Text("x".into()),
            ])
            .unwrap_err();
        assert_eq!(err.kind(), cube_common::ErrorKind::BadArgument);
    }

    #[test]
    fn test_bytes_and_label_object() {
        let t = reseaus();
        assert_eq!(t.record_bytes(), 8 + 8 + 4 + 4 + 8);
        let bytes = t.to_bytes(ByteOrder::Msb);
        let object = t.to_label_object(1001, bytes.len(), ByteOrder::Msb);
        let desc = Table::describe(&object).unwrap();
        assert_eq!(desc.start_byte, 1001);
        assert_eq!(desc.fields, t.fields().to_vec());

        let back = Table::from_bytes(&desc.name, desc.fields, &bytes, desc.records, desc.order).unwrap();
        assert_eq!(back, t);
        let note = back.field_index("note").unwrap();
        assert_eq!(back.records()[0][note].as_text(), Some("edge"));
    }
}
