//! The saved story record shown next to the view.
//!
//! The record is inert metadata. It is loaded before mounting and displayed
//! in the overlay; the environment does not depend on it.

use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryRecord {
    pub id: String,
    pub title: String,
    pub character_name: String,
    pub profession: String,
    pub workplace: String,
    #[serde(default)]
    pub life_facts: Vec<String>,
    pub backstory: String,
    pub primary_setting: String,
    pub mood: String,
    pub time_period: String,
    pub created_at: String,
    pub updated_at: String,
}

impl StoryRecord {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|err| anyhow::anyhow!("reading {}: {err}", path.display()))?;
        Self::from_json(&json)
    }

    pub fn show(&self, ctx: &egui::Context) {
        egui::SidePanel::right("story")
            .resizable(true)
            .default_width(260.0)
            .show(ctx, |ui| {
                ui.heading(&self.title);
                ui.label(
                    egui::RichText::new(format!("{}, {}", self.character_name, self.profession))
                        .color(egui::Color32::from_rgb(200, 150, 100)),
                );
                ui.add_space(5.0);
                ui.separator();
                ui.monospace(format!("Workplace: {}", self.workplace));
                ui.monospace(format!("Setting:   {}", self.primary_setting));
                ui.monospace(format!("Mood:      {}", self.mood));
                ui.monospace(format!("Period:    {}", self.time_period));
                ui.add_space(5.0);
                ui.separator();
                egui::ScrollArea::vertical().show(ui, |ui| {
                    for fact in &self.life_facts {
                        ui.label(format!("• {fact}"));
                    }
                    ui.add_space(5.0);
                    ui.label(&self.backstory);
                });
            });
    }
}
