use super::ResultMap;
use crate::optimizer::OptimizationResult;
use serde::Serialize;

/// Shape the downstream scheduler expects for each entry of `deckParams`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeckParams<'a> {
    deck_name: &'a str,
    w: &'a [f64],
    request_retention: f64,
    maximum_interval: u32,
    easy_bonus: f64,
    hard_interval: f64,
}

impl<'a> From<&'a OptimizationResult> for DeckParams<'a> {
    fn from(result: &'a OptimizationResult) -> Self {
        DeckParams {
            deck_name: &result.deck_name,
            w: &result.weights,
            request_retention: result.request_retention,
            maximum_interval: result.tunables.maximum_interval,
            easy_bonus: result.tunables.easy_bonus,
            hard_interval: result.tunables.hard_interval,
        }
    }
}

/// Render every result as a `const deckParams = [...]` array literal, in map order.
///
/// Each element is a self-contained JSON object followed by a comma, ready to be
/// pasted into the scheduler configuration.
pub fn render_deck_params(results: &ResultMap) -> String {
    let mut out = String::from("const deckParams = [\n");
    for result in results.iter() {
        // A struct of plain fields and f64 slices always serializes.
        let object = serde_json::to_string_pretty(&DeckParams::from(result)).unwrap_or_default();
        for line in object.lines() {
            out.push_str("  ");
            out.push_str(line);
            out.push('\n');
        }
        // Turn the closing brace line into "  },"
        out.pop();
        out.push_str(",\n");
    }
    out.push_str("];");
    out
}
