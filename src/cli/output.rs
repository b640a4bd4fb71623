//! Output formatting for CLI

use ravendb_ingest::emitter::SchemaField;

/// Format emitted fields as an aligned table
pub fn format_fields(fields: &[SchemaField]) -> String {
    let width = fields
        .iter()
        .map(|f| f.field_path.len())
        .max()
        .unwrap_or(0)
        .max("FIELD".len());

    let mut output = format!("{:<width$}  {:<8}  {:<5}  TYPE\n", "FIELD", "NULLABLE", "COUNT");
    for field in fields {
        output.push_str(&format!(
            "{:<width$}  {:<8}  {:<5}  {}\n",
            field.field_path,
            if field.nullable { "yes" } else { "no" },
            field.count,
            field.field_type
        ));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use ravendb_ingest::emitter::LogicalType;
    use ravendb_ingest::inference::TypeTag;

    #[test]
    fn test_format_fields() {
        let fields = vec![SchemaField {
            field_path: "address.city".to_string(),
            native_data_type: "string".to_string(),
            field_type: LogicalType::Scalar(TypeTag::String),
            nullable: true,
            count: 3,
        }];
        let table = format_fields(&fields);
        let lines: Vec<&str> = table.lines().collect();
        assert!(lines[0].starts_with("FIELD"));
        assert!(lines[1].starts_with("address.city  yes"));
        assert!(lines[1].ends_with("string"));
    }
}
