use anyhow::Result;
use colored::Colorize;
use reconcile::{KindClass, KindDescriptor, Registry};

use crate::Context;
use crate::client::Client;
use crate::ui;

pub fn run(ctx: &Context) -> Result<()> {
    ui::header("Kinds");

    for class in [KindClass::Resource, KindClass::DataSource] {
        let descriptors = of_class(&ctx.registry, class);
        ui::section(&format!("{} ({})", heading(class), descriptors.len()));
        for descriptor in descriptors {
            println!("  {}", descriptor.name.bold());
            if !ctx.quiet {
                ui::dim(&format!("  {}", descriptor.summary));
            }
            if let Some(format) = descriptor.id_format {
                ui::kv("  id", &format.to_string());
            }
        }
    }

    println!();
    Ok(())
}

fn heading(class: KindClass) -> &'static str {
    match class {
        KindClass::Resource => "Resources",
        KindClass::DataSource => "Data sources",
    }
}

/// Descriptors of one class, in name order.
pub fn of_class(registry: &Registry<Client>, class: KindClass) -> Vec<&KindDescriptor> {
    registry
        .descriptors()
        .filter(|descriptor| descriptor.class == class)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry;

    #[test]
    fn test_of_class_splits_and_sorts() {
        let registry = registry::builtin().unwrap();
        let resources = of_class(&registry, KindClass::Resource);
        let sources = of_class(&registry, KindClass::DataSource);
        assert_eq!(resources.len() + sources.len(), registry.len());
        assert_eq!(resources.len(), 6);

        let names: Vec<_> = resources.iter().map(|d| d.name).collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
        assert!(sources.iter().any(|d| d.name == "gitlab_current_user"));
    }
}
