// ABOUTME: Rendering values back into source text

use crate::heap::Heap;
use crate::symbol::SymbolTable;
use crate::value::{Procedure, Value};

/// Renders values. `write` output is read-compatible (strings quoted and
/// escaped); `display` renders strings raw for human consumption.
pub struct Printer<'a> {
    heap: &'a Heap,
    symbols: &'a SymbolTable,
}

impl<'a> Printer<'a> {
    pub fn new(heap: &'a Heap, symbols: &'a SymbolTable) -> Self {
        Printer { heap, symbols }
    }

    pub fn write(&self, value: &Value) -> String {
        let mut out = String::new();
        self.render(&mut out, value, true);
        out
    }

    pub fn display(&self, value: &Value) -> String {
        let mut out = String::new();
        self.render(&mut out, value, false);
        out
    }

    fn render(&self, out: &mut String, value: &Value, quote_strings: bool) {
        match value {
            Value::Number(n) => render_number(out, *n),
            Value::Bool(b) => out.push_str(if *b { "#t" } else { "#f" }),
            Value::Str(s) => {
                if quote_strings {
                    out.push('"');
                    for c in s.chars() {
                        match c {
                            '"' => out.push_str("\\\""),
                            '\\' => out.push_str("\\\\"),
                            other => out.push(other),
                        }
                    }
                    out.push('"');
                } else {
                    out.push_str(s);
                }
            }
            Value::Symbol(id) => out.push_str(self.symbols.name(*id)),
            Value::Nil => out.push_str("()"),
            Value::Unspecified => out.push_str("#<unspecified>"),
            Value::Pair(handle) => {
                out.push('(');
                let cell = self.heap.pair(*handle);
                self.render(out, &cell.first, quote_strings);
                let mut rest = cell.rest.clone();
                loop {
                    match rest {
                        Value::Nil => break,
                        Value::Pair(h) => {
                            out.push(' ');
                            let cell = self.heap.pair(h);
                            self.render(out, &cell.first, quote_strings);
                            rest = cell.rest.clone();
                        }
                        other => {
                            out.push_str(" . ");
                            self.render(out, &other, quote_strings);
                            break;
                        }
                    }
                }
                out.push(')');
            }
            Value::Procedure(handle) => match self.heap.procedure(*handle) {
                Procedure::Primitive(prim) => {
                    out.push_str("#<primitive ");
                    out.push_str(prim.name);
                    out.push('>');
                }
                Procedure::Compound(_) => out.push_str("#<procedure>"),
            },
        }
    }
}

/// Integral doubles print without a decimal point, the rest as Rust renders
/// them.
fn render_number(out: &mut String, n: f64) {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
        out.push_str(&format!("{}", n as i64));
    } else {
        out.push_str(&format!("{}", n));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::Reader;

    /// Read one datum and hand back its written form.
    fn round_trip(src: &str) -> String {
        let mut heap = Heap::new();
        let mut symbols = SymbolTable::new();
        let datums = Reader::new(&mut heap, &mut symbols)
            .read_all(src)
            .expect("read should succeed");
        let printer = Printer::new(&heap, &symbols);
        printer.write(&datums[0])
    }

    #[test]
    fn test_atoms_round_trip() {
        for src in ["42", "-42", "2.5", "#t", "#f", "foo", "set-car!", "()"] {
            assert_eq!(round_trip(src), src);
        }
    }

    #[test]
    fn test_strings_round_trip() {
        assert_eq!(round_trip(r#""hello""#), r#""hello""#);
        assert_eq!(round_trip(r#""say \"hi\"""#), r#""say \"hi\"""#);
        assert_eq!(round_trip(r#""a\\b""#), r#""a\\b""#);
    }

    #[test]
    fn test_lists_round_trip() {
        for src in ["(1 2 3)", "(a (b 2.5) c)", "(1 . 2)", "(a b . c)", "(quote x)"] {
            assert_eq!(round_trip(src), src);
        }
    }

    #[test]
    fn test_display_strips_quotes() {
        let mut heap = Heap::new();
        let mut symbols = SymbolTable::new();
        let datums = Reader::new(&mut heap, &mut symbols)
            .read_all(r#""hi there""#)
            .expect("read should succeed");
        let printer = Printer::new(&heap, &symbols);
        assert_eq!(printer.display(&datums[0]), "hi there");
        assert_eq!(printer.write(&datums[0]), r#""hi there""#);
    }

    #[test]
    fn test_integral_numbers_drop_the_point() {
        let heap = Heap::new();
        let symbols = SymbolTable::new();
        let printer = Printer::new(&heap, &symbols);
        assert_eq!(printer.write(&Value::Number(3.0)), "3");
        assert_eq!(printer.write(&Value::Number(-2.5)), "-2.5");
        assert_eq!(printer.write(&Value::Number(0.0)), "0");
    }
}
