//! Table normalization for DOCX documents.
//!
//! The repair itself: a single pass over `word/document.xml` that walks
//! every table (document order, nested tables included), clears cell
//! shading, resets cell paragraph styles, forces run formatting to plain
//! black text, and applies one of two border policies. Everything outside
//! tables is copied through untouched, and text content is never modified.
//!
//! Per-element failures follow a best-effort policy: a run whose properties
//! cannot be rewritten is copied verbatim and counted in the report instead
//! of aborting the pass. Only a whole-document XML parse failure is an
//! error.

use crate::docx::styles::StyleMap;
use crate::error::{Error, Result};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use serde::Serialize;

/// Border size for table-level borders, in eighths of a point (0.75pt).
const TABLE_BORDER_SIZE: &str = "6";

/// Border size for the per-cell fallback borders (0.5pt).
const CELL_BORDER_SIZE: &str = "4";

/// Table-property children that the schema places before `w:tblBorders`.
const TBL_PR_BEFORE_BORDERS: &[&[u8]] = &[
    b"w:tblpPr",
    b"w:tblOverlap",
    b"w:bidiVisual",
    b"w:tblStyleRowBandSize",
    b"w:tblStyleColBandSize",
    b"w:tblW",
    b"w:jc",
    b"w:tblCellSpacing",
    b"w:tblInd",
];

/// Cell-property children that the schema places before `w:tcBorders`.
const TC_PR_BEFORE_BORDERS: &[&[u8]] =
    &[b"w:cnfStyle", b"w:tcW", b"w:gridSpan", b"w:hMerge", b"w:vMerge"];

/// Border policy applied to each table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BorderMode {
    /// Assign the built-in grid table style (thin black borders, no fill).
    #[default]
    StyleGrid,
    /// Clear the table style and stamp explicit single-line black borders,
    /// table-level plus a per-cell fallback for renderers that do not
    /// inherit table borders.
    ExplicitBorders,
}

/// Options for a fix pass.
#[derive(Debug, Clone)]
pub struct FixOptions {
    /// Border policy.
    pub border_mode: BorderMode,
    /// Table style ID used in [`BorderMode::StyleGrid`] mode.
    pub table_style: String,
    /// Paragraph style to reset cell paragraphs to. `None` selects the
    /// document's default paragraph style (typically "Normal").
    pub paragraph_style: Option<String>,
}

impl Default for FixOptions {
    fn default() -> Self {
        Self {
            border_mode: BorderMode::default(),
            table_style: "TableGrid".to_string(),
            paragraph_style: None,
        }
    }
}

impl FixOptions {
    /// Create options with the given border mode and defaults otherwise.
    pub fn with_border_mode(mode: BorderMode) -> Self {
        Self {
            border_mode: mode,
            ..Default::default()
        }
    }
}

/// Counters describing what a fix pass did.
///
/// `tables` is the user-facing processed-table count; the skip counters
/// surface the elements the best-effort policy left untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FixReport {
    /// Tables visited (nested tables included).
    pub tables: usize,
    /// Cells whose explicit shading was reset to no-fill.
    pub cells_cleared: usize,
    /// Cell paragraphs reset to the target paragraph style.
    pub paragraphs_restyled: usize,
    /// Cell paragraphs left as-is because the target style is missing
    /// from the document's style registry.
    pub paragraphs_skipped: usize,
    /// Runs forced to black, non-bold, non-italic.
    pub runs_normalized: usize,
    /// Runs left as-is because their properties could not be rewritten.
    pub runs_skipped: usize,
}

/// Normalize every table in a `word/document.xml` part.
///
/// Returns the rewritten XML and the report. The pass is idempotent:
/// normalizing already-normalized XML yields byte-identical output.
pub fn normalize_document_xml(
    xml: &str,
    styles: &StyleMap,
    options: &FixOptions,
) -> Result<(String, FixReport)> {
    let events = collect_events(xml)?;
    let mut normalizer = Normalizer {
        mode: options.border_mode,
        table_style: &options.table_style,
        paragraph_target: styles.paragraph_reset_target(options.paragraph_style.as_deref()),
        report: FixReport::default(),
    };

    let mut out = Writer::new(Vec::with_capacity(xml.len() + 256));
    let mut i = 0;
    while i < events.len() {
        match &events[i] {
            Event::Start(e) if e.name().as_ref() == b"w:tbl" => {
                let end = subtree_end(&events, i);
                normalizer.write_table(&mut out, &events, i, end)?;
                i = end + 1;
            }
            ev => {
                out.write_event(ev.borrow())?;
                i += 1;
            }
        }
    }

    let bytes = out.into_inner();
    let xml = String::from_utf8(bytes).map_err(|e| Error::InvalidData(e.to_string()))?;
    Ok((xml, normalizer.report))
}

/// Read all events of an XML part into an owned list.
///
/// Text is not trimmed: whitespace inside `w:t` elements is significant.
fn collect_events(xml: &str) -> Result<Vec<Event<'static>>> {
    let mut reader = Reader::from_str(xml);
    let mut events = Vec::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Eof) => break,
            Ok(ev) => events.push(ev.into_owned()),
            Err(e) => return Err(Error::XmlParse(e.to_string())),
        }
        buf.clear();
    }
    Ok(events)
}

/// Index of the End event matching the Start event at `start`.
///
/// The reader rejects ill-formed nesting, so every Start has a matching
/// End by the time events reach this function.
fn subtree_end(events: &[Event<'_>], start: usize) -> usize {
    let mut depth = 0usize;
    for (i, ev) in events.iter().enumerate().skip(start) {
        match ev {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    return i;
                }
            }
            _ => {}
        }
    }
    events.len() - 1
}

/// An empty element with a single `w:val` attribute.
fn val_element(name: &'static str, val: &str) -> Event<'static> {
    let mut e = BytesStart::new(name);
    e.push_attribute(("w:val", val));
    Event::Empty(e)
}

/// The run-property overrides: explicit off-toggles so a bold table style
/// cannot re-assert bold through inheritance, plus pure black color.
fn run_overrides() -> Vec<Event<'static>> {
    vec![
        val_element("w:b", "0"),
        val_element("w:bCs", "0"),
        val_element("w:i", "0"),
        val_element("w:iCs", "0"),
        val_element("w:color", "000000"),
    ]
}

/// A full border set: Start/End of `name` around one single-line black
/// border element per side.
fn border_set(name: &'static str, sides: &[&'static str], size: &'static str) -> Vec<Event<'static>> {
    let mut events = Vec::with_capacity(sides.len() + 2);
    events.push(Event::Start(BytesStart::new(name)));
    for side in sides {
        let mut border = BytesStart::new(*side);
        border.push_attribute(("w:val", "single"));
        border.push_attribute(("w:sz", size));
        border.push_attribute(("w:space", "0"));
        border.push_attribute(("w:color", "000000"));
        events.push(Event::Empty(border));
    }
    events.push(Event::End(BytesEnd::new(name)));
    events
}

/// Table-level borders: all four outer sides plus both interior divider
/// directions.
fn table_borders() -> Vec<Event<'static>> {
    border_set(
        "w:tblBorders",
        &[
            "w:top",
            "w:left",
            "w:bottom",
            "w:right",
            "w:insideH",
            "w:insideV",
        ],
        TABLE_BORDER_SIZE,
    )
}

/// Per-cell fallback borders: the four sides of one cell.
fn cell_borders() -> Vec<Event<'static>> {
    border_set(
        "w:tcBorders",
        &["w:top", "w:left", "w:bottom", "w:right"],
        CELL_BORDER_SIZE,
    )
}

struct Normalizer<'a> {
    mode: BorderMode,
    table_style: &'a str,
    paragraph_target: Option<String>,
    report: FixReport,
}

impl Normalizer<'_> {
    /// Rewrite one `w:tbl` subtree (`events[start..=end]`).
    fn write_table(
        &mut self,
        out: &mut Writer<Vec<u8>>,
        events: &[Event<'static>],
        start: usize,
        end: usize,
    ) -> Result<()> {
        self.report.tables += 1;
        out.write_event(events[start].borrow())?;
        let mut i = start + 1;

        // Range markup (bookmarks, comment anchors) may precede the table
        // properties, so scan forward to the real w:tblPr instead of
        // assuming it is the first element child. The scan stops at the
        // grid or the first row; a table without w:tblPr gets one there.
        let mut props_done = false;
        while i < end && !props_done {
            match &events[i] {
                Event::Start(e) if e.name().as_ref() == b"w:tblPr" => {
                    let pr_end = subtree_end(events, i);
                    self.rewrite_table_props(out, events, i, pr_end)?;
                    i = pr_end + 1;
                    props_done = true;
                }
                Event::Empty(e) if e.name().as_ref() == b"w:tblPr" => {
                    self.write_synthesized_table_props(out)?;
                    i += 1;
                    props_done = true;
                }
                Event::Start(e) | Event::Empty(e)
                    if matches!(e.name().as_ref(), b"w:tblGrid" | b"w:tr") =>
                {
                    break;
                }
                Event::Start(_) => {
                    let sub_end = subtree_end(events, i);
                    copy_range(out, events, i, sub_end)?;
                    i = sub_end + 1;
                }
                ev => {
                    out.write_event(ev.borrow())?;
                    i += 1;
                }
            }
        }
        if !props_done {
            self.write_synthesized_table_props(out)?;
        }

        while i < end {
            match &events[i] {
                Event::Start(e) if e.name().as_ref() == b"w:tc" => {
                    let tc_end = subtree_end(events, i);
                    self.write_cell(out, events, i, tc_end)?;
                    i = tc_end + 1;
                }
                ev => {
                    out.write_event(ev.borrow())?;
                    i += 1;
                }
            }
        }

        out.write_event(events[end].borrow())?;
        Ok(())
    }

    /// Rewrite an existing `w:tblPr` subtree.
    ///
    /// Existing `w:tblStyle` is always dropped, and `w:tblBorders` as well
    /// in explicit-border mode. The injected style is the first child (its
    /// schema slot); injected borders go after the width/alignment
    /// properties the schema puts ahead of `w:tblBorders`.
    fn rewrite_table_props(
        &mut self,
        out: &mut Writer<Vec<u8>>,
        events: &[Event<'static>],
        start: usize,
        end: usize,
    ) -> Result<()> {
        out.write_event(events[start].borrow())?;
        if self.mode == BorderMode::StyleGrid {
            out.write_event(val_element("w:tblStyle", self.table_style))?;
        }

        let mut borders_injected = self.mode != BorderMode::ExplicitBorders;
        let mut i = start + 1;
        while i < end {
            match &events[i] {
                Event::Empty(e) | Event::Start(e)
                    if e.name().as_ref() == b"w:tblStyle"
                        || (self.mode == BorderMode::ExplicitBorders
                            && e.name().as_ref() == b"w:tblBorders") =>
                {
                    i = skip_subtree(events, i);
                }
                Event::Empty(e) | Event::Start(e)
                    if !borders_injected
                        && !TBL_PR_BEFORE_BORDERS.contains(&e.name().as_ref()) =>
                {
                    for ev in table_borders() {
                        out.write_event(ev.borrow())?;
                    }
                    borders_injected = true;
                }
                ev => {
                    out.write_event(ev.borrow())?;
                    i += 1;
                }
            }
        }
        if !borders_injected {
            for ev in table_borders() {
                out.write_event(ev.borrow())?;
            }
        }

        out.write_event(events[end].borrow())?;
        Ok(())
    }

    /// Emit a full `w:tblPr` for a table that has none.
    fn write_synthesized_table_props(&mut self, out: &mut Writer<Vec<u8>>) -> Result<()> {
        out.write_event(Event::Start(BytesStart::new("w:tblPr")))?;
        self.write_border_policy(out)?;
        out.write_event(Event::End(BytesEnd::new("w:tblPr")))?;
        Ok(())
    }

    /// The table-level half of the border policy.
    fn write_border_policy(&mut self, out: &mut Writer<Vec<u8>>) -> Result<()> {
        match self.mode {
            BorderMode::StyleGrid => {
                out.write_event(val_element("w:tblStyle", self.table_style))?;
            }
            BorderMode::ExplicitBorders => {
                for ev in table_borders() {
                    out.write_event(ev.borrow())?;
                }
            }
        }
        Ok(())
    }

    /// Rewrite one `w:tc` subtree: shading, cell borders, paragraphs,
    /// nested tables.
    fn write_cell(
        &mut self,
        out: &mut Writer<Vec<u8>>,
        events: &[Event<'static>],
        start: usize,
        end: usize,
    ) -> Result<()> {
        out.write_event(events[start].borrow())?;
        let mut i = start + 1;

        i = self.copy_until_element(out, events, i, end)?;
        match &events[i] {
            Event::Start(e) if e.name().as_ref() == b"w:tcPr" => {
                let pr_end = subtree_end(events, i);
                self.rewrite_cell_props(out, events, i, pr_end)?;
                i = pr_end + 1;
            }
            Event::Empty(e) if e.name().as_ref() == b"w:tcPr" => {
                if self.mode == BorderMode::ExplicitBorders {
                    self.write_synthesized_cell_props(out)?;
                } else {
                    out.write_event(events[i].borrow())?;
                }
                i += 1;
            }
            _ => {
                if self.mode == BorderMode::ExplicitBorders {
                    self.write_synthesized_cell_props(out)?;
                }
            }
        }

        while i < end {
            match &events[i] {
                Event::Start(e) if e.name().as_ref() == b"w:p" => {
                    let p_end = subtree_end(events, i);
                    self.write_cell_paragraph(out, events, i, p_end)?;
                    i = p_end + 1;
                }
                Event::Empty(e) if e.name().as_ref() == b"w:p" => {
                    self.write_empty_cell_paragraph(out)?;
                    i += 1;
                }
                Event::Start(e) if e.name().as_ref() == b"w:tbl" => {
                    let tbl_end = subtree_end(events, i);
                    self.write_table(out, events, i, tbl_end)?;
                    i = tbl_end + 1;
                }
                ev => {
                    out.write_event(ev.borrow())?;
                    i += 1;
                }
            }
        }

        out.write_event(events[end].borrow())?;
        Ok(())
    }

    /// Rewrite an existing `w:tcPr` subtree.
    ///
    /// An existing `w:shd` is reset to clear/auto in both border modes —
    /// this is the primary defect fix. A cell with no `w:shd` gets none.
    /// Injected `w:tcBorders` go after the width/span/merge properties the
    /// schema puts ahead of them.
    fn rewrite_cell_props(
        &mut self,
        out: &mut Writer<Vec<u8>>,
        events: &[Event<'static>],
        start: usize,
        end: usize,
    ) -> Result<()> {
        out.write_event(events[start].borrow())?;

        let mut borders_injected = self.mode != BorderMode::ExplicitBorders;
        let mut i = start + 1;
        let mut cleared = false;
        while i < end {
            match &events[i] {
                Event::Empty(e) | Event::Start(e)
                    if self.mode == BorderMode::ExplicitBorders
                        && e.name().as_ref() == b"w:tcBorders" =>
                {
                    i = skip_subtree(events, i);
                }
                Event::Empty(e) | Event::Start(e)
                    if !borders_injected
                        && !TC_PR_BEFORE_BORDERS.contains(&e.name().as_ref()) =>
                {
                    for ev in cell_borders() {
                        out.write_event(ev.borrow())?;
                    }
                    borders_injected = true;
                }
                Event::Empty(e) | Event::Start(e) if e.name().as_ref() == b"w:shd" => {
                    out.write_event(Event::Empty(cleared_shading(e)))?;
                    cleared = true;
                    i = skip_subtree(events, i);
                }
                ev => {
                    out.write_event(ev.borrow())?;
                    i += 1;
                }
            }
        }
        if !borders_injected {
            for ev in cell_borders() {
                out.write_event(ev.borrow())?;
            }
        }

        if cleared {
            self.report.cells_cleared += 1;
        }
        out.write_event(events[end].borrow())?;
        Ok(())
    }

    /// Emit a full `w:tcPr` for a cell that has none (explicit-border
    /// mode only; without a shading element there is nothing to clear).
    fn write_synthesized_cell_props(&mut self, out: &mut Writer<Vec<u8>>) -> Result<()> {
        out.write_event(Event::Start(BytesStart::new("w:tcPr")))?;
        for ev in cell_borders() {
            out.write_event(ev.borrow())?;
        }
        out.write_event(Event::End(BytesEnd::new("w:tcPr")))?;
        Ok(())
    }

    /// Rewrite one `w:p` subtree inside a table cell.
    fn write_cell_paragraph(
        &mut self,
        out: &mut Writer<Vec<u8>>,
        events: &[Event<'static>],
        start: usize,
        end: usize,
    ) -> Result<()> {
        out.write_event(events[start].borrow())?;
        let mut i = start + 1;

        i = self.copy_until_element(out, events, i, end)?;
        match &events[i] {
            Event::Start(e) if e.name().as_ref() == b"w:pPr" => {
                let pr_end = subtree_end(events, i);
                if let Some(target) = self.paragraph_target.clone() {
                    self.rewrite_paragraph_props(out, events, i, pr_end, &target)?;
                } else {
                    self.report.paragraphs_skipped += 1;
                    copy_range(out, events, i, pr_end)?;
                }
                i = pr_end + 1;
            }
            Event::Empty(e) if e.name().as_ref() == b"w:pPr" => {
                if self.paragraph_target.is_some() {
                    self.write_synthesized_paragraph_props(out)?;
                } else {
                    self.report.paragraphs_skipped += 1;
                    out.write_event(events[i].borrow())?;
                }
                i += 1;
            }
            _ => {
                if self.paragraph_target.is_some() {
                    self.write_synthesized_paragraph_props(out)?;
                } else {
                    self.report.paragraphs_skipped += 1;
                }
            }
        }

        while i < end {
            match &events[i] {
                Event::Start(e) if e.name().as_ref() == b"w:r" => {
                    let r_end = subtree_end(events, i);
                    self.write_run(out, events, i, r_end)?;
                    i = r_end + 1;
                }
                ev => {
                    out.write_event(ev.borrow())?;
                    i += 1;
                }
            }
        }

        out.write_event(events[end].borrow())?;
        Ok(())
    }

    /// Expand a self-closed `<w:p/>` so the style reset still applies.
    fn write_empty_cell_paragraph(&mut self, out: &mut Writer<Vec<u8>>) -> Result<()> {
        if self.paragraph_target.is_some() {
            out.write_event(Event::Start(BytesStart::new("w:p")))?;
            self.write_synthesized_paragraph_props(out)?;
            out.write_event(Event::End(BytesEnd::new("w:p")))?;
        } else {
            self.report.paragraphs_skipped += 1;
            out.write_event(Event::Empty(BytesStart::new("w:p")))?;
        }
        Ok(())
    }

    /// Rewrite an existing `w:pPr`: the style reference must be the first
    /// child, existing `w:pStyle` is dropped, everything else kept.
    fn rewrite_paragraph_props(
        &mut self,
        out: &mut Writer<Vec<u8>>,
        events: &[Event<'static>],
        start: usize,
        end: usize,
        target: &str,
    ) -> Result<()> {
        out.write_event(events[start].borrow())?;
        out.write_event(val_element("w:pStyle", target))?;
        self.report.paragraphs_restyled += 1;

        let mut i = start + 1;
        while i < end {
            match &events[i] {
                Event::Empty(e) | Event::Start(e) if e.name().as_ref() == b"w:pStyle" => {
                    i = skip_subtree(events, i);
                }
                ev => {
                    out.write_event(ev.borrow())?;
                    i += 1;
                }
            }
        }

        out.write_event(events[end].borrow())?;
        Ok(())
    }

    fn write_synthesized_paragraph_props(&mut self, out: &mut Writer<Vec<u8>>) -> Result<()> {
        let target = self
            .paragraph_target
            .clone()
            .unwrap_or_else(|| "Normal".to_string());
        out.write_event(Event::Start(BytesStart::new("w:pPr")))?;
        out.write_event(val_element("w:pStyle", &target))?;
        self.report.paragraphs_restyled += 1;
        out.write_event(Event::End(BytesEnd::new("w:pPr")))?;
        Ok(())
    }

    /// Rewrite one `w:r` subtree: force black, non-bold, non-italic. On a
    /// per-run rewrite failure the original events are copied verbatim and
    /// the run is counted as skipped.
    fn write_run(
        &mut self,
        out: &mut Writer<Vec<u8>>,
        events: &[Event<'static>],
        start: usize,
        end: usize,
    ) -> Result<()> {
        out.write_event(events[start].borrow())?;
        let mut i = start + 1;

        i = self.copy_until_element(out, events, i, end)?;
        match &events[i] {
            Event::Start(e) if e.name().as_ref() == b"w:rPr" => {
                let pr_end = subtree_end(events, i);
                match rewrite_run_props(events, i, pr_end) {
                    Ok(rewritten) => {
                        for ev in rewritten {
                            out.write_event(ev.borrow())?;
                        }
                        self.report.runs_normalized += 1;
                    }
                    Err(_) => {
                        self.report.runs_skipped += 1;
                        copy_range(out, events, i, pr_end)?;
                    }
                }
                i = pr_end + 1;
            }
            Event::Empty(e) if e.name().as_ref() == b"w:rPr" => {
                self.write_synthesized_run_props(out)?;
                i += 1;
            }
            _ => {
                self.write_synthesized_run_props(out)?;
            }
        }

        while i < end {
            out.write_event(events[i].borrow())?;
            i += 1;
        }

        out.write_event(events[end].borrow())?;
        Ok(())
    }

    fn write_synthesized_run_props(&mut self, out: &mut Writer<Vec<u8>>) -> Result<()> {
        out.write_event(Event::Start(BytesStart::new("w:rPr")))?;
        for ev in run_overrides() {
            out.write_event(ev.borrow())?;
        }
        out.write_event(Event::End(BytesEnd::new("w:rPr")))?;
        self.report.runs_normalized += 1;
        Ok(())
    }

    /// Copy non-element events (text, comments) until the next element
    /// event or `end`, returning the new position.
    fn copy_until_element(
        &mut self,
        out: &mut Writer<Vec<u8>>,
        events: &[Event<'static>],
        mut i: usize,
        end: usize,
    ) -> Result<usize> {
        while i < end {
            match &events[i] {
                Event::Start(_) | Event::Empty(_) | Event::End(_) => break,
                ev => {
                    out.write_event(ev.borrow())?;
                    i += 1;
                }
            }
        }
        Ok(i)
    }
}

/// Rebuild a `w:rPr` subtree with bold/italic cleared and color black.
///
/// Leading `w:rStyle`/`w:rFonts` children keep their position so the
/// injected toggles land where the schema expects them; existing
/// `w:b`/`w:bCs`/`w:i`/`w:iCs`/`w:color` are dropped. Malformed attributes
/// on a touched child make the whole run skip.
fn rewrite_run_props(
    events: &[Event<'static>],
    start: usize,
    end: usize,
) -> Result<Vec<Event<'static>>> {
    let mut head: Vec<Event<'static>> = vec![events[start].clone()];
    let mut tail: Vec<Event<'static>> = Vec::new();
    let mut in_leading = true;

    let mut i = start + 1;
    while i < end {
        match &events[i] {
            Event::Empty(e) | Event::Start(e) => {
                // A child whose attributes cannot be parsed poisons the run.
                e.attributes()
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|err| Error::XmlParse(err.to_string()))?;

                let next = skip_subtree(events, i);
                match e.name().as_ref() {
                    b"w:b" | b"w:bCs" | b"w:i" | b"w:iCs" | b"w:color" => {
                        in_leading = false;
                    }
                    b"w:rStyle" | b"w:rFonts" if in_leading => {
                        head.extend(events[i..next].iter().cloned());
                    }
                    _ => {
                        in_leading = false;
                        tail.extend(events[i..next].iter().cloned());
                    }
                }
                i = next;
            }
            ev => {
                tail.push(ev.clone());
                i += 1;
            }
        }
    }

    head.extend(run_overrides());
    head.extend(tail);
    head.push(events[end].clone());
    Ok(head)
}

/// A `w:shd` element reset to "no fill": `w:val="clear"`, `w:fill="auto"`,
/// theme-fill attributes dropped so a theme cannot re-darken the cell.
fn cleared_shading(original: &BytesStart<'_>) -> BytesStart<'static> {
    let mut shd = BytesStart::new("w:shd");
    let mut has_val = false;
    let mut has_fill = false;

    for attr in original.attributes().flatten() {
        match attr.key.as_ref() {
            b"w:val" => {
                shd.push_attribute(("w:val", "clear"));
                has_val = true;
            }
            b"w:fill" => {
                shd.push_attribute(("w:fill", "auto"));
                has_fill = true;
            }
            b"w:themeFill" | b"w:themeFillTint" | b"w:themeFillShade" => {}
            key => {
                if let (Ok(key), Ok(value)) =
                    (std::str::from_utf8(key), attr.unescape_value())
                {
                    shd.push_attribute((key, value.as_ref()));
                }
            }
        }
    }

    if !has_val {
        shd.push_attribute(("w:val", "clear"));
    }
    if !has_fill {
        shd.push_attribute(("w:fill", "auto"));
    }
    shd
}

/// Skip past the subtree rooted at `i`, returning the index after it.
fn skip_subtree(events: &[Event<'_>], i: usize) -> usize {
    match &events[i] {
        Event::Start(_) => subtree_end(events, i) + 1,
        _ => i + 1,
    }
}

/// Copy `events[from..=to]` to the writer unchanged.
fn copy_range(out: &mut Writer<Vec<u8>>, events: &[Event<'static>], from: usize, to: usize) -> Result<()> {
    for ev in &events[from..=to] {
        out.write_event(ev.borrow())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const STYLES_XML: &str = r#"<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
        <w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/></w:style>
        <w:style w:type="table" w:styleId="TableGrid"><w:name w:val="Table Grid"/></w:style>
    </w:styles>"#;

    fn styles() -> StyleMap {
        StyleMap::parse(STYLES_XML).unwrap()
    }

    fn shaded_table_doc() -> String {
        let cell = |text: &str| {
            format!(
                "<w:tc><w:tcPr><w:shd w:val=\"clear\" w:color=\"auto\" w:fill=\"000000\"/></w:tcPr>\
                 <w:p><w:r><w:rPr><w:b/><w:i/><w:color w:val=\"FFFFFF\"/></w:rPr>\
                 <w:t>{}</w:t></w:r></w:p></w:tc>",
                text
            )
        };
        format!(
            "<w:document><w:body><w:tbl><w:tblPr><w:tblStyle w:val=\"DarkList\"/></w:tblPr>\
             <w:tr>{}{}</w:tr><w:tr>{}{}</w:tr></w:tbl>\
             <w:p><w:r><w:rPr><w:b/></w:rPr><w:t>outside</w:t></w:r></w:p>\
             </w:body></w:document>",
            cell("A"),
            cell("B"),
            cell("C"),
            cell("D")
        )
    }

    #[test]
    fn test_style_grid_clears_shading_and_formatting() {
        let (out, report) =
            normalize_document_xml(&shaded_table_doc(), &styles(), &FixOptions::default()).unwrap();

        assert_eq!(report.tables, 1);
        assert_eq!(report.cells_cleared, 4);
        assert_eq!(report.runs_normalized, 4);
        assert_eq!(report.paragraphs_restyled, 4);
        assert_eq!(report.paragraphs_skipped, 0);
        assert_eq!(report.runs_skipped, 0);

        assert!(out.contains("<w:tblStyle w:val=\"TableGrid\"/>"));
        assert!(!out.contains("DarkList"));
        assert!(!out.contains("w:fill=\"000000\""));
        assert!(out.contains("w:fill=\"auto\""));
        assert!(out.contains("<w:color w:val=\"000000\"/>"));
        assert!(out.contains("<w:pStyle w:val=\"Normal\"/>"));

        // The fixture keeps a bold paragraph after the table, so the
        // formatting checks look at the table slice only.
        let table = &out[..out.find("</w:tbl>").unwrap()];
        assert!(!table.contains("<w:b/>"));
        assert!(!table.contains("<w:i/>"));
        assert!(!table.contains("FFFFFF"));
    }

    #[test]
    fn test_text_outside_tables_untouched() {
        let (out, _) =
            normalize_document_xml(&shaded_table_doc(), &styles(), &FixOptions::default()).unwrap();

        // The paragraph after the table keeps its bold run.
        let after_table = &out[out.find("</w:tbl>").unwrap()..];
        assert!(after_table.contains("<w:b/>"));
        assert!(after_table.contains("<w:t>outside</w:t>"));
    }

    #[test]
    fn test_text_content_preserved() {
        let (out, _) =
            normalize_document_xml(&shaded_table_doc(), &styles(), &FixOptions::default()).unwrap();
        for text in ["<w:t>A</w:t>", "<w:t>B</w:t>", "<w:t>C</w:t>", "<w:t>D</w:t>"] {
            assert!(out.contains(text), "missing {}", text);
        }
    }

    #[test]
    fn test_explicit_borders_mode() {
        let options = FixOptions::with_border_mode(BorderMode::ExplicitBorders);
        let (out, report) =
            normalize_document_xml(&shaded_table_doc(), &styles(), &options).unwrap();

        assert_eq!(report.tables, 1);
        assert!(!out.contains("w:tblStyle"));
        assert!(out.contains("<w:tblBorders>"));
        assert!(out.contains("<w:insideH w:val=\"single\" w:sz=\"6\" w:space=\"0\" w:color=\"000000\"/>"));
        assert!(out.contains("<w:insideV"));
        // Per-cell fallback borders on every one of the four cells.
        assert_eq!(out.matches("<w:tcBorders>").count(), 4);
        assert!(out.contains("<w:top w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"000000\"/>"));
    }

    #[test]
    fn test_idempotence() {
        for options in [
            FixOptions::default(),
            FixOptions::with_border_mode(BorderMode::ExplicitBorders),
        ] {
            let (once, _) =
                normalize_document_xml(&shaded_table_doc(), &styles(), &options).unwrap();
            let (twice, report) = normalize_document_xml(&once, &styles(), &options).unwrap();
            assert_eq!(once, twice);
            // Shading is already clear/auto; re-clearing still counts the cell.
            assert_eq!(report.tables, 1);
        }
    }

    #[test]
    fn test_zero_tables() {
        let xml = "<w:document><w:body><w:p><w:r><w:t>Hello</w:t></w:r></w:p></w:body></w:document>";
        let (out, report) = normalize_document_xml(xml, &styles(), &FixOptions::default()).unwrap();
        assert_eq!(report, FixReport::default());
        assert_eq!(out, xml);
    }

    #[test]
    fn test_cell_without_shading_is_not_given_one() {
        let xml = "<w:document><w:body><w:tbl><w:tr>\
                   <w:tc><w:p><w:r><w:t>plain</w:t></w:r></w:p></w:tc>\
                   </w:tr></w:tbl></w:body></w:document>";
        let (out, report) = normalize_document_xml(xml, &styles(), &FixOptions::default()).unwrap();
        assert_eq!(report.cells_cleared, 0);
        assert_eq!(report.runs_normalized, 1);
        assert!(!out.contains("w:shd"));
        // The run had no rPr; one is synthesized.
        assert!(out.contains("<w:rPr><w:b w:val=\"0\"/>"));
    }

    #[test]
    fn test_missing_normal_style_skips_paragraphs() {
        let empty_styles = StyleMap::default();
        let (out, report) =
            normalize_document_xml(&shaded_table_doc(), &empty_styles, &FixOptions::default())
                .unwrap();
        assert_eq!(report.paragraphs_restyled, 0);
        assert_eq!(report.paragraphs_skipped, 4);
        // Shading and runs are still fixed.
        assert_eq!(report.cells_cleared, 4);
        assert_eq!(report.runs_normalized, 4);
        assert!(!out.contains("w:pStyle"));
    }

    #[test]
    fn test_nested_table_counted_and_fixed() {
        let xml = "<w:document><w:body><w:tbl><w:tr><w:tc>\
                   <w:tcPr><w:shd w:val=\"clear\" w:fill=\"111111\"/></w:tcPr>\
                   <w:tbl><w:tr><w:tc>\
                   <w:tcPr><w:shd w:val=\"clear\" w:fill=\"222222\"/></w:tcPr>\
                   <w:p><w:r><w:t>inner</w:t></w:r></w:p>\
                   </w:tc></w:tr></w:tbl>\
                   <w:p/></w:tc></w:tr></w:tbl></w:body></w:document>";
        let (out, report) = normalize_document_xml(xml, &styles(), &FixOptions::default()).unwrap();
        assert_eq!(report.tables, 2);
        assert_eq!(report.cells_cleared, 2);
        assert!(!out.contains("111111"));
        assert!(!out.contains("222222"));
    }

    #[test]
    fn test_theme_fill_attributes_dropped() {
        let xml = "<w:document><w:body><w:tbl><w:tr><w:tc>\
                   <w:tcPr><w:shd w:val=\"solid\" w:fill=\"1F1F1F\" w:themeFill=\"text1\"/></w:tcPr>\
                   <w:p><w:r><w:t>x</w:t></w:r></w:p>\
                   </w:tc></w:tr></w:tbl></w:body></w:document>";
        let (out, report) = normalize_document_xml(xml, &styles(), &FixOptions::default()).unwrap();
        assert_eq!(report.cells_cleared, 1);
        assert!(!out.contains("themeFill"));
        assert!(out.contains("<w:shd w:val=\"clear\" w:fill=\"auto\"/>"));
    }

    #[test]
    fn test_structure_preserved() {
        let xml = "<w:document><w:body><w:tbl><w:tr>\
                   <w:tc><w:tcPr><w:gridSpan w:val=\"2\"/></w:tcPr><w:p><w:r><w:t>wide</w:t></w:r></w:p></w:tc>\
                   </w:tr></w:tbl></w:body></w:document>";
        let (out, _) = normalize_document_xml(xml, &styles(), &FixOptions::default()).unwrap();
        // Merge spans survive the rewrite.
        assert!(out.contains("<w:gridSpan w:val=\"2\"/>"));
        assert_eq!(out.matches("<w:tr>").count(), 1);
        assert_eq!(out.matches("<w:tc>").count(), 1);
    }

    #[test]
    fn test_run_inside_hyperlink_normalized() {
        let xml = "<w:document><w:body><w:tbl><w:tr><w:tc><w:p>\
                   <w:hyperlink r:id=\"rId1\"><w:r><w:rPr><w:b/></w:rPr><w:t>link</w:t></w:r></w:hyperlink>\
                   </w:p></w:tc></w:tr></w:tbl></w:body></w:document>";
        let (out, report) = normalize_document_xml(xml, &styles(), &FixOptions::default()).unwrap();
        assert_eq!(report.runs_normalized, 1);
        assert!(!out.contains("<w:b/>"));
        assert!(out.contains("<w:hyperlink r:id=\"rId1\">"));
    }

    #[test]
    fn test_malformed_document_errors() {
        let xml = "<w:document><w:body></w:p></w:document>";
        let err = normalize_document_xml(xml, &styles(), &FixOptions::default());
        assert!(matches!(err, Err(Error::XmlParse(_))));
    }

    #[test]
    fn test_bookmark_before_table_props() {
        let xml = "<w:document><w:body><w:tbl>\
                   <w:bookmarkStart w:id=\"0\" w:name=\"tbl_anchor\"/>\
                   <w:tblPr><w:tblStyle w:val=\"DarkList\"/></w:tblPr>\
                   <w:tr><w:tc><w:p><w:r><w:t>x</w:t></w:r></w:p></w:tc></w:tr>\
                   <w:bookmarkEnd w:id=\"0\"/>\
                   </w:tbl></w:body></w:document>";
        let (out, report) = normalize_document_xml(xml, &styles(), &FixOptions::default()).unwrap();
        assert_eq!(report.tables, 1);
        // The real w:tblPr is rewritten in place, not duplicated.
        assert_eq!(out.matches("<w:tblPr>").count(), 1);
        assert!(!out.contains("DarkList"));
        assert!(out.contains("<w:tblStyle w:val=\"TableGrid\"/>"));
        assert!(out.contains("<w:bookmarkStart w:id=\"0\" w:name=\"tbl_anchor\"/>"));
        assert!(out.find("w:bookmarkStart").unwrap() < out.find("<w:tblPr>").unwrap());
    }

    #[test]
    fn test_table_without_props_after_bookmark() {
        let xml = "<w:document><w:body><w:tbl>\
                   <w:bookmarkStart w:id=\"1\" w:name=\"b\"/>\
                   <w:tblGrid><w:gridCol w:w=\"2000\"/></w:tblGrid>\
                   <w:tr><w:tc><w:p><w:r><w:t>x</w:t></w:r></w:p></w:tc></w:tr>\
                   </w:tbl></w:body></w:document>";
        let (out, _) = normalize_document_xml(xml, &styles(), &FixOptions::default()).unwrap();
        assert_eq!(out.matches("<w:tblPr>").count(), 1);
        // Synthesized properties land between the bookmark and the grid.
        assert!(out.contains("<w:bookmarkStart w:id=\"1\" w:name=\"b\"/><w:tblPr>"));
        assert!(out.contains("</w:tblPr><w:tblGrid>"));
    }

    #[test]
    fn test_injected_borders_follow_width_properties() {
        let xml = "<w:document><w:body><w:tbl>\
                   <w:tblPr><w:tblStyle w:val=\"DarkList\"/>\
                   <w:tblW w:w=\"0\" w:type=\"auto\"/><w:tblLook w:val=\"04A0\"/></w:tblPr>\
                   <w:tr><w:tc>\
                   <w:tcPr><w:tcW w:w=\"2000\" w:type=\"dxa\"/><w:gridSpan w:val=\"2\"/></w:tcPr>\
                   <w:p><w:r><w:t>x</w:t></w:r></w:p>\
                   </w:tc></w:tr></w:tbl></w:body></w:document>";
        let options = FixOptions::with_border_mode(BorderMode::ExplicitBorders);
        let (out, _) = normalize_document_xml(xml, &styles(), &options).unwrap();
        // tblBorders sit between tblW and tblLook, tcBorders after gridSpan.
        assert!(out.contains("<w:tblW w:w=\"0\" w:type=\"auto\"/><w:tblBorders>"));
        assert!(out.contains("</w:tblBorders><w:tblLook w:val=\"04A0\"/>"));
        assert!(out.contains("<w:gridSpan w:val=\"2\"/><w:tcBorders>"));
    }

    #[test]
    fn test_run_style_kept_ahead_of_overrides() {
        let xml = "<w:document><w:body><w:tbl><w:tr><w:tc><w:p>\
                   <w:r><w:rPr><w:rStyle w:val=\"Strong\"/><w:b/><w:sz w:val=\"24\"/></w:rPr><w:t>s</w:t></w:r>\
                   </w:p></w:tc></w:tr></w:tbl></w:body></w:document>";
        let (out, _) = normalize_document_xml(xml, &styles(), &FixOptions::default()).unwrap();
        assert!(out.contains(
            "<w:rPr><w:rStyle w:val=\"Strong\"/><w:b w:val=\"0\"/><w:bCs w:val=\"0\"/>\
             <w:i w:val=\"0\"/><w:iCs w:val=\"0\"/><w:color w:val=\"000000\"/><w:sz w:val=\"24\"/></w:rPr>"
        ));
    }
}
