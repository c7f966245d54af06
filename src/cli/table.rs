use std::fmt::{self, Write};

/// Minimal fixed-width table for terminal listings. Columns are padded to
/// the widest cell; headers are single words so the output stays awk- and
/// grep-friendly.
pub(crate) struct Table {
    header: Option<Vec<String>>,
    body: Vec<Vec<String>>,
    num_columns: Option<usize>,
    print_header: bool,
}

impl Table {
    pub(crate) fn new() -> Table {
        Table {
            header: None,
            body: Vec::new(),
            num_columns: None,
            print_header: true,
        }
    }

    fn expect_num_columns(&mut self, count: usize) {
        match self.num_columns {
            Some(existing) if existing != count => {
                panic!("table has {} columns but a row has {}", existing, count)
            }
            Some(_) => {}
            None => self.num_columns = Some(count),
        }
    }

    pub(crate) fn set_header<S: ToString>(&mut self, header: Vec<S>) {
        let header: Vec<String> = header.into_iter().map(|s| s.to_string()).collect();

        assert!(
            header.iter().all(|h| !h.contains(char::is_whitespace)),
            "table headers must be single words"
        );

        self.expect_num_columns(header.len());
        self.header = Some(header);
    }

    pub(crate) fn add_row<S: ToString>(&mut self, row: Vec<S>) {
        let row: Vec<String> = row.into_iter().map(|s| s.to_string()).collect();

        self.expect_num_columns(row.len());
        self.body.push(row);
    }

    pub(crate) fn print_header(&mut self, print_header: bool) {
        self.print_header = print_header;
    }

    fn rows(&self) -> impl Iterator<Item = &Vec<String>> {
        let header = match self.print_header {
            true => self.header.as_ref(),
            false => None,
        };

        header.into_iter().chain(self.body.iter())
    }

    fn column_widths(&self) -> Vec<usize> {
        let mut widths = vec![0usize; self.num_columns.unwrap_or(0)];

        for row in self.rows() {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.len());
            }
        }

        widths
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths = self.column_widths();

        for row in self.rows() {
            for (i, cell) in row.iter().enumerate() {
                if i + 1 == row.len() {
                    // No trailing padding on the last column.
                    f.write_str(cell)?;
                } else {
                    f.write_fmt(format_args!("{:<width$}  ", cell, width = widths[i]))?;
                }
            }

            f.write_char('\n')?;
        }

        Ok(())
    }
}

pub(crate) trait IntoTable: Into<Table> + Sized {
    fn into_table(self) -> Table {
        self.into()
    }
}

impl<T> IntoTable for T where T: Into<Table> + Sized {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_align_to_the_widest_cell() {
        let mut tab = Table::new();

        tab.set_header(vec!["MODEL", "PROVIDER"]);
        tab.add_row(vec!["llama3-70b-8192", "groq"]);
        tab.add_row(vec!["gpt-4o", "openai"]);

        let rendered = tab.to_string();

        assert_eq!(
            rendered,
            "MODEL            PROVIDER\n\
             llama3-70b-8192  groq\n\
             gpt-4o           openai\n"
        );
    }

    #[test]
    fn headerless_output_skips_the_header() {
        let mut tab = Table::new();

        tab.set_header(vec!["A"]);
        tab.add_row(vec!["x"]);
        tab.print_header(false);

        assert_eq!(tab.to_string(), "x\n");
    }
}
