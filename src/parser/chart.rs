use race_mileage_utils::{regex, selector};
use scraper::{ElementRef, Html};

use crate::{chrono_util::WeekKey, error::ParseError, schema::MileagePoint};

pub const GRAPH: &str = "div.athlete-graph";
const Y_AXIS_LABEL: &str = "ul.y-axis > li";
const INTERVAL: &str = "ul.intervals > li";
const FILL: &str = "div.bar div.fill";

/// Reads the weekly mileage bar chart of a profile page.
///
/// Bars are returned in document order, which is chronological.
pub fn parse(html: &Html) -> Result<Vec<MileagePoint>, ParseError> {
    let graph = html
        .select(selector!(GRAPH))
        .next()
        .ok_or(ParseError::MissingElement(GRAPH))?;
    let y_max = parse_y_max(graph)?;
    graph
        .select(selector!(INTERVAL))
        .map(|interval| {
            let id = interval
                .value()
                .attr("id")
                .ok_or(ParseError::MissingAttribute {
                    element: INTERVAL,
                    attr: "id",
                })?;
            let week_start = WeekKey::parse(id)?.monday()?;
            let height = parse_bar_height(interval)?;
            Ok(MileagePoint {
                week_start,
                miles: bar_miles(y_max, height),
            })
        })
        .collect()
}

/// The topmost y-axis label is the chart's maximum.
fn parse_y_max(graph: ElementRef) -> Result<u32, ParseError> {
    let text = graph
        .select(selector!(Y_AXIS_LABEL))
        .last()
        .ok_or(ParseError::MissingElement(Y_AXIS_LABEL))?
        .text()
        .collect::<String>();
    text.trim().parse().map_err(|_| ParseError::InvalidNumber {
        what: "y-axis maximum",
        text,
    })
}

/// Bar height in percent of the y-axis maximum, taken from a style such as
/// `height:83%;` or `height: 12.5%`.  A bar without a fill element is empty.
fn parse_bar_height(interval: ElementRef) -> Result<f64, ParseError> {
    let Some(fill) = interval.select(selector!(FILL)).next() else {
        return Ok(0.0);
    };
    let style = fill.value().attr("style").unwrap_or("height:0");
    let invalid = || ParseError::InvalidNumber {
        what: "bar height",
        text: style.to_owned(),
    };
    let number = regex!(r"height\s*:\s*(\d+(?:\.\d+)?)")
        .captures(style)
        .or_else(|| regex!(r"(\d+(?:\.\d+)?)").captures(style))
        .ok_or_else(invalid)?;
    let height = number[1].parse::<f64>().map_err(|_| invalid())?;
    if height > 100.0 {
        return Err(invalid());
    }
    Ok(height)
}

pub fn bar_miles(y_max: u32, height_percent: f64) -> f64 {
    f64::from(y_max) * height_percent / 100.0
}
