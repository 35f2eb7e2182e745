//! The row output interface and the CSV reference writer.

use std::io::{BufWriter, Write as _};

use rowforge_ast::Name;
use rowforge_error::Result;
use rowforge_eval::CompiledTable;
use rowforge_types::Value;

/// How generated rows reach a file format.
///
/// The row-driving loop calls these hooks in order: a file header once,
/// then per row group a header, rows (value headers, values, and
/// separators), and a trailer. Implementations own buffering and escaping.
pub trait Writer {
    /// Content at the very beginning of the file.
    fn write_file_header(&mut self, table: &CompiledTable) -> Result<()>;
    /// Content before each row group.
    fn write_row_group_header(&mut self, table: &CompiledTable) -> Result<()>;
    /// The column name before a value, for formats that label values.
    fn write_value_header(&mut self, column: &Name) -> Result<()>;
    /// A single value.
    fn write_value(&mut self, value: &Value) -> Result<()>;
    /// The separator between values of one row.
    fn write_value_separator(&mut self) -> Result<()>;
    /// The separator between rows.
    fn write_row_separator(&mut self) -> Result<()>;
    /// Content after each row group.
    fn write_row_group_trailer(&mut self) -> Result<()>;
}

/// CSV output: a header line of column names, comma-separated values,
/// RFC-style quoting. NULL renders as `\N`.
pub struct CsvWriter<W: std::io::Write> {
    out: BufWriter<W>,
}

impl<W: std::io::Write> CsvWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            out: BufWriter::new(inner),
        }
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        self.out
            .into_inner()
            .map_err(|e| rowforge_error::ForgeError::Io(e.into_error()))
    }

    fn write_field(&mut self, text: &str) -> Result<()> {
        let needs_quoting = text
            .bytes()
            .any(|b| matches!(b, b',' | b'"' | b'\n' | b'\r'));
        if needs_quoting {
            self.out.write_all(b"\"")?;
            self.out.write_all(text.replace('"', "\"\"").as_bytes())?;
            self.out.write_all(b"\"")?;
        } else {
            self.out.write_all(text.as_bytes())?;
        }
        Ok(())
    }
}

impl<W: std::io::Write> Writer for CsvWriter<W> {
    fn write_file_header(&mut self, table: &CompiledTable) -> Result<()> {
        for (i, column) in table.columns.iter().enumerate() {
            if i > 0 {
                self.out.write_all(b",")?;
            }
            self.write_field(&column.norm)?;
        }
        self.out.write_all(b"\n")?;
        Ok(())
    }

    fn write_row_group_header(&mut self, _table: &CompiledTable) -> Result<()> {
        Ok(())
    }

    fn write_value_header(&mut self, _column: &Name) -> Result<()> {
        Ok(())
    }

    fn write_value(&mut self, value: &Value) -> Result<()> {
        if value.is_null() {
            self.out.write_all(b"\\N")?;
            return Ok(());
        }
        self.write_field(&value.to_string())
    }

    fn write_value_separator(&mut self) -> Result<()> {
        self.out.write_all(b",")?;
        Ok(())
    }

    fn write_row_separator(&mut self) -> Result<()> {
        self.out.write_all(b"\n")?;
        Ok(())
    }

    fn write_row_group_trailer(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rowforge_eval::CompileContext;
    use rowforge_parser::parse;
    use rowforge_eval::State;

    use super::*;

    #[test]
    fn test_csv_writer_renders_rows() {
        let template = parse(
            "CREATE TABLE t (id INT {{ rownum }}, name CHAR(8) {{ 'a,\"b' }}, x INT {{ null }});",
        )
        .unwrap();
        let mut ctx = CompileContext::new();
        let compiled = ctx.compile_template(&template).unwrap();
        let table = &compiled.tables[0];

        let mut writer = CsvWriter::new(Vec::new());
        writer.write_file_header(table).unwrap();
        writer.write_row_group_header(table).unwrap();
        let mut state = State::new(&mut ctx, 0);
        for row_num in 1..=2 {
            state.row_num = row_num;
            let row = table.row.eval(&mut state).unwrap();
            for (i, (column, value)) in table.columns.iter().zip(&row).enumerate() {
                if i > 0 {
                    writer.write_value_separator().unwrap();
                }
                writer.write_value_header(column).unwrap();
                writer.write_value(value).unwrap();
            }
            writer.write_row_separator().unwrap();
        }
        writer.write_row_group_trailer().unwrap();

        let bytes = writer.into_inner().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, "id,name,x\n1,\"a,\"\"b\",\\N\n2,\"a,\"\"b\",\\N\n");
    }
}
