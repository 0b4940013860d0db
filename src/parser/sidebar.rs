use itertools::Itertools;
use race_mileage_utils::{regex, selector};
use scraper::{ElementRef, Html, Selector};

use crate::{error::ParseError, schema::AllTimeTotals};

pub const RUNNING: &str = "div.running.hidden";
pub const CYCLING: &str = "div.cycling.hidden";
const YEAR_TO_DATE_ID: &str = "running-ytd";

/// Where the all-time block sits in the running section.
///
/// Normally the last block is something else and the all-time totals are the
/// second-to-last.  When the athlete hides their year-to-date data, the
/// second-to-last block is the year-to-date one and all-time moves to the end.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RunningLayout {
    AllTimeSecondToLast,
    AllTimeLast,
}

impl RunningLayout {
    pub fn detect(second_to_last: ElementRef) -> Self {
        if second_to_last.value().attr("id") == Some(YEAR_TO_DATE_ID) {
            RunningLayout::AllTimeLast
        } else {
            RunningLayout::AllTimeSecondToLast
        }
    }
}

pub fn parse(html: &Html) -> Result<AllTimeTotals, ParseError> {
    Ok(AllTimeTotals {
        running: parse_running(html)?,
        cycling: parse_cycling(html)?,
    })
}

fn parse_running(html: &Html) -> Result<f64, ParseError> {
    let section = find_section(html, selector!(RUNNING), RUNNING)?;
    let blocks = section.select(selector!("tbody")).collect_vec();
    let [.., second_to_last, last] = blocks[..] else {
        return Err(ParseError::MissingElement("div.running.hidden tbody (two blocks)"));
    };
    let block = match RunningLayout::detect(second_to_last) {
        RunningLayout::AllTimeSecondToLast => second_to_last,
        RunningLayout::AllTimeLast => last,
    };
    parse_total(block, "all-time running distance")
}

fn parse_cycling(html: &Html) -> Result<f64, ParseError> {
    let block = find_section(html, selector!(CYCLING), CYCLING)?
        .select(selector!("tbody"))
        .last()
        .ok_or(ParseError::MissingElement("div.cycling.hidden tbody"))?;
    parse_total(block, "all-time cycling distance")
}

fn find_section<'a>(
    html: &'a Html,
    selector: &Selector,
    name: &'static str,
) -> Result<ElementRef<'a>, ParseError> {
    html.select(selector)
        .next()
        .ok_or(ParseError::MissingElement(name))
}

/// The distance is the second cell of the second row, e.g. `1,234.5<abbr>mi</abbr>`.
fn parse_total(block: ElementRef, what: &'static str) -> Result<f64, ParseError> {
    let cell = child_elements(block, "tr")
        .nth(1)
        .and_then(|row| child_elements(row, "td").nth(1))
        .ok_or(ParseError::MissingElement("tbody > tr:nth-child(2) > td:nth-child(2)"))?;
    let text = cell
        .children()
        .filter_map(|node| node.value().as_text())
        .map(|text| &**text)
        .collect::<String>();
    parse_distance(&text).ok_or(ParseError::InvalidNumber { what, text })
}

fn child_elements<'a>(
    parent: ElementRef<'a>,
    name: &'static str,
) -> impl Iterator<Item = ElementRef<'a>> {
    parent
        .children()
        .filter_map(ElementRef::wrap)
        .filter(move |e| e.value().name() == name)
}

/// Drops everything but digits and the decimal point before parsing.
pub fn parse_distance(text: &str) -> Option<f64> {
    regex!(r"[^\d.]+").replace_all(text, "").parse().ok()
}
