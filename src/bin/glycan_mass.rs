use glycochem::{Composition, GlycanBoxes, GlycanDatabase, Mass, Result, build_boxes};
use localizer::Tolerance;
use miette::{Diagnostic, GraphicalReportHandler, GraphicalTheme};
use once_cell::sync::Lazy;
use rustyline::DefaultEditor;
use std::fmt::Write;

const MAX_GLYCANS: usize = 3;
const MASS_TOLERANCE: Tolerance = Tolerance::Ppm(10.0);

static GLYCAN_DB: Lazy<GlycanDatabase> = Lazy::new(GlycanDatabase::default);
// SAFETY: Every box is built from the default database, so every glycan lookup succeeds
static GLYCAN_BOXES: Lazy<GlycanBoxes> =
    Lazy::new(|| GlycanBoxes::new(&GLYCAN_DB, build_boxes(&GLYCAN_DB, MAX_GLYCANS)).unwrap());

fn main() {
    let mut rl = DefaultEditor::new().unwrap();
    while let Ok(line) = rl.readline("Glycan: ") {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        rl.add_history_entry(line).unwrap();
        match glycan_info(line) {
            Ok(info) => print!("{info}"),
            Err(diagnostic) => render_error(*diagnostic),
        }
    }
}

fn glycan_info(line: &str) -> Result<String> {
    let mut buf = String::new();

    if let Ok(mass) = line.parse::<f64>() {
        let (low, high) = MASS_TOLERANCE.bounds(mass);
        let matches = GLYCAN_BOXES.within(Mass::from_daltons(low), Mass::from_daltons(high));
        writeln!(buf, "Glycan Boxes: {}", matches.len()).unwrap();
        for glycan_box in matches.filter_map(|i| GLYCAN_BOXES.get(i)) {
            let composition = glycan_box.composition();
            let box_mass = glycan_box.mass();
            let error = (box_mass.to_f64() - mass) / mass * 1e6;
            writeln!(buf, "  {composition} ({}): {box_mass} ({error:+.2} ppm)", glycan_box.id_string())
                .unwrap();
        }
    } else {
        let composition = if line.starts_with('(') {
            Composition::from_structure(line)?
        } else {
            Composition::new(line)?
        };
        writeln!(buf, "Composition: {composition}").unwrap();
        writeln!(buf, "Monosaccharides: {}", composition.len()).unwrap();
        writeln!(buf, "Monoisotopic Mass: {}", composition.mass()).unwrap();
    }

    writeln!(buf).unwrap();
    Ok(buf)
}

fn render_error(diagnostic: impl Into<Box<dyn Diagnostic + 'static>>) {
    let mut buf = String::new();
    GraphicalReportHandler::new_themed(GraphicalTheme::unicode())
        .render_report(&mut buf, diagnostic.into().as_ref())
        .unwrap();
    println!("{buf}");
}
