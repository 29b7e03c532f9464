use vte::{Parser as VteParser, Perform};

/// Drop escape sequences, keep printable text plus newline, carriage return and tab.
pub(super) fn strip_escape_sequences(bytes: &[u8]) -> String {
    struct TextCollector {
        output: String,
    }

    impl Perform for TextCollector {
        fn print(&mut self, c: char) {
            self.output.push(c);
        }

        fn execute(&mut self, byte: u8) {
            match byte {
                b'\n' | b'\r' | b'\t' => self.output.push(byte as char),
                _ => {}
            }
        }
    }

    let mut parser = VteParser::new();
    let mut collector = TextCollector {
        output: String::with_capacity(bytes.len()),
    };
    parser.advance(&mut collector, bytes);
    collector.output
}
