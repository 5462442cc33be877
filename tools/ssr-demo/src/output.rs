//! Console output for the demo server.

use console::style;

/// Output handler for console messages.
#[derive(Debug, Clone)]
pub struct Output {
    verbose: bool,
}

impl Output {
    /// Create a new output handler.
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Whether verbose output was requested.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Print an info message.
    pub fn info(&self, msg: &str) {
        println!("{} {}", style("ℹ").blue(), msg);
    }

    /// Print a success message.
    pub fn success(&self, msg: &str) {
        println!("{} {}", style("✓").green(), msg);
    }

    /// Print an error message.
    pub fn error(&self, msg: &str) {
        eprintln!("{} {}", style("✗").red(), style(msg).red());
    }

    /// Print a debug message (only in verbose mode).
    pub fn debug(&self, msg: &str) {
        if !self.verbose {
            return;
        }
        eprintln!("{} {}", style("→").dim(), style(msg).dim());
    }

    /// Print a header/title.
    pub fn header(&self, msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a numbered endpoint with its description.
    pub fn endpoint(&self, num: usize, url: &str, description: &[&str]) {
        println!("{} {}", style(format!("{}.", num)).dim(), style(url).cyan());
        for line in description {
            println!("   {}", line);
        }
        println!();
    }

    /// Print a shell command hint.
    pub fn command(&self, cmd: &str) {
        println!("  {}", style(cmd).yellow());
    }

    /// Banner for the chunked response demo.
    pub fn basic_banner(&self, base_url: &str) {
        self.success(&format!("Server started on {}/", base_url));
        println!();
        self.info("Use curl to send a request and see the response streaming in:");
        println!();
        self.command(&format!("curl --no-buffer -i {}/", base_url));
        println!();
    }

    /// Banner for the server render demo.
    pub fn suspense_banner(&self, base_url: &str) {
        self.success(&format!("Server started on {}", base_url));
        self.header("Endpoints");
        println!();

        self.endpoint(
            1,
            &format!("{}/renderToString", base_url),
            &[
                "Waits for all async texts, then returns the whole",
                "document as one response body.",
            ],
        );
        self.endpoint(
            2,
            &format!("{}/renderToStaticNodeStream", base_url),
            &[
                "Opens a streamed response but writes nothing until every",
                "async text has resolved.",
            ],
        );
        self.endpoint(
            3,
            &format!("{}/renderToPipeableStream", base_url),
            &[
                "Returns the shell immediately, replacing the fallbacks",
                "as more and more data is available.",
            ],
        );
        self.endpoint(
            4,
            &format!("{}/fallbackOnly", base_url),
            &["Returns immediately, rendering only the fallbacks."],
        );
        self.endpoint(
            5,
            &format!("{}/render?mode=<mode>&fail=<n>", base_url),
            &["Any mode by name; `fail` makes the n-th async text reject."],
        );

        self.info("Use curl to watch the chunks arrive:");
        println!();
        self.command(&format!(
            "curl --no-buffer -i {}/renderToPipeableStream",
            base_url
        ));
        println!();
    }
}

/// Format microseconds as milliseconds.
pub fn format_us(us: u64) -> String {
    format!("{:.2}ms", us as f64 / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_us() {
        assert_eq!(format_us(1_500), "1.50ms");
        assert_eq!(format_us(0), "0.00ms");
    }
}
