//! milltrack main entrypoint.

use milltrack::run;
use milltrack::ui::messages::error;

fn main() {
    if let Err(e) = run() {
        error(format!("Error: {e}"));
        std::process::exit(1);
    }
}
