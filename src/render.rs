use crate::coordinator::Renderer;
use crate::workout::{Workout, WorkoutKind};
use std::io::{self, Write};

const EMPTY_HINT: &str = "No workouts yet. Add one with `mapty add running|cycling`.";

/// Renders workouts as tab-separated text rows.
#[derive(Debug, Default)]
pub struct TextRenderer {
    rows: Vec<(String, String)>,
    notices: Vec<String>,
    empty: bool,
}

impl TextRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|(_, line)| line.as_str())
    }

    /// Messages for the user, in the order they were raised.
    pub fn notices(&self) -> &[String] {
        &self.notices
    }

    pub fn print(&self, mut out: impl Write) -> io::Result<()> {
        if self.empty {
            writeln!(out, "{EMPTY_HINT}")?;
            return Ok(());
        }
        for (i, (_, line)) in self.rows.iter().enumerate() {
            writeln!(out, "{}\t{line}", i + 1)?;
        }
        Ok(())
    }
}

impl Renderer for TextRenderer {
    fn append_row(&mut self, workout: &Workout) {
        self.rows.push((workout.id().to_string(), format_row(workout)));
    }

    fn remove_row(&mut self, id: &str) {
        self.rows.retain(|(row_id, _)| row_id != id);
    }

    fn replace_row(&mut self, id: &str, workout: &Workout) {
        if let Some(row) = self.rows.iter_mut().find(|(row_id, _)| row_id == id) {
            row.1 = format_row(workout);
        }
    }

    fn clear_rows(&mut self) {
        self.rows.clear();
    }

    fn set_empty_state(&mut self, empty: bool) {
        self.empty = empty;
    }

    fn notify(&mut self, message: &str) {
        self.notices.push(message.to_string());
    }
}

/// One line per workout: description, core numbers, conditions, place, id.
pub fn format_row(w: &Workout) -> String {
    let metrics = match *w.kind() {
        WorkoutKind::Running { cadence, pace } => {
            format!("{pace:.1} min/km\t{cadence} spm")
        }
        WorkoutKind::Cycling {
            elevation_gain,
            speed,
        } => format!("{speed:.2} km/h\t{elevation_gain} m"),
    };

    let temp = w
        .conditions()
        .temperature
        .map_or_else(|| "-".to_string(), |t| format!("{t}°C"));

    format!(
        "{} {}\t{} km\t{} min\t{metrics}\t{temp}\t{} {}\t{}, {}\t{}",
        w.tag().emoji(),
        w.description(),
        w.distance(),
        w.duration(),
        w.time(),
        w.time_unit(),
        w.place().city,
        w.place().country,
        w.id(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Conditions, Coords, Place};
    use chrono::{Local, TimeZone};

    fn running() -> Workout {
        let when = Local.with_ymd_and_hms(2024, 3, 14, 9, 5, 0).single().unwrap();
        Workout::running("r1".into(), when, Coords::new(48.0, -1.0), 5.0, 32.0, 150.0)
            .with_conditions(Conditions {
                temperature: Some(12),
                icon: None,
            })
            .with_place(Place {
                city: "Rennes".into(),
                country: "France".into(),
            })
    }

    #[test]
    fn running_row_layout() {
        let row = format_row(&running());
        let cols: Vec<&str> = row.split('\t').collect();
        assert!(cols[0].ends_with("Running on March 14"));
        assert_eq!(cols[1], "5 km");
        assert_eq!(cols[2], "32 min");
        assert_eq!(cols[3], "6.4 min/km");
        assert_eq!(cols[4], "150 spm");
        assert_eq!(cols[5], "12°C");
        assert_eq!(cols[6], "09:05 AM");
        assert_eq!(cols[7], "Rennes, France");
        assert_eq!(cols[8], "r1");
    }

    #[test]
    fn rows_follow_instructions() {
        let mut r = TextRenderer::new();
        let mut w = running();
        r.append_row(&w);
        w.apply_edit(10.0, 50.0, 150.0);
        r.replace_row("r1", &w);
        assert!(r.rows().next().unwrap().contains("5.0 min/km"));

        r.remove_row("r1");
        r.set_empty_state(true);
        let mut out = Vec::new();
        r.print(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap().trim(), EMPTY_HINT);
    }
}
