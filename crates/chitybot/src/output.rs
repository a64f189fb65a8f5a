use serde::Serialize;

/// Prints run reports on stdout and failures on stderr, as text or as one
/// JSON object per line.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    json: bool,
}

/// One line of `--json` output.
#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Line<'a, T: Serialize> {
    Event(EventLine<'a, T>),
    /// End-of-run report.
    Summary { bots: T },
    Failure { error: &'a str },
}

/// Something a running bot reached, e.g. `ready`.
#[derive(Serialize)]
struct EventLine<'a, T: Serialize> {
    event: &'a str,
    #[serde(flatten)]
    data: T,
}

impl Output {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    pub fn event<T: Serialize>(&self, event: &str, data: T) {
        if self.json {
            println!("{}", compact(&Line::Event(EventLine { event, data })));
        } else {
            println!("[{}] {}", event, compact(&data));
        }
    }

    /// Per-bot report printed once every bot has finished.
    pub fn summary<T: Serialize>(&self, bots: T) {
        if self.json {
            println!("{}", compact(&Line::Summary { bots }));
        } else {
            match serde_json::to_string_pretty(&bots) {
                Ok(text) => println!("{}", text),
                Err(e) => eprintln!("Error: cannot render summary: {}", e),
            }
        }
    }

    pub fn failure(&self, error: &str) {
        if self.json {
            let line: Line<'_, ()> = Line::Failure { error };
            eprintln!("{}", compact(&line));
        } else {
            eprintln!("Error: {}", error);
        }
    }
}

fn compact<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|e| serde_json::json!({ "kind": "failure", "error": e.to_string() }).to_string())
}
