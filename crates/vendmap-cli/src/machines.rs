//! `machines` subcommands. Everything goes through the REST API.

use std::path::PathBuf;

use clap::Subcommand;
use vendmap_client::{refresh_view, ImageUpload, VendmapClient};
use vendmap_core::{
    Coordinates, LocationPermission, MachineDraft, MapSurface, MapView, Popup, ProximityGrouper,
    VendingMachineRecord, DEFAULT_TOLERANCE_DEG,
};

#[derive(Debug, Subcommand)]
pub enum MachineCommands {
    /// List every machine
    List,
    /// Show one machine with its inventory
    Show { id: i64 },
    /// Show the machines sharing a location with `id` (what a marker click opens)
    Group {
        id: i64,
        /// Co-location tolerance in degrees
        #[arg(long, default_value_t = DEFAULT_TOLERANCE_DEG)]
        tolerance: f64,
    },
    /// Print every group of co-located machines
    Clusters {
        #[arg(long, default_value_t = DEFAULT_TOLERANCE_DEG)]
        tolerance: f64,
    },
    /// Add a machine (requires a session token)
    Add {
        #[arg(long, allow_hyphen_values = true)]
        lat: Option<f64>,
        #[arg(long, allow_hyphen_values = true)]
        lon: Option<f64>,
        /// Take coordinates from a campus building instead of --lat/--lon
        #[arg(long, conflicts_with_all = ["lat", "lon"])]
        building: Option<String>,
        /// Defaults to the building name when --building is given
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        desc: String,
        /// Item name; repeat for several items
        #[arg(long = "item")]
        items: Vec<String>,
        #[arg(long)]
        unavailable: bool,
        /// Photo to upload (png, jpg, jpeg, webp, gif)
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Edit a machine's inventory or availability (requires a session token)
    Edit {
        id: i64,
        /// Append an item
        #[arg(long = "add-item")]
        add: Vec<String>,
        /// Flip an item's availability by its position in `show`
        #[arg(long = "toggle")]
        toggle: Vec<usize>,
        /// Remove an item by its position in `show`
        #[arg(long = "remove")]
        remove: Vec<usize>,
        #[arg(long)]
        available: Option<bool>,
    },
}

/// Prints map pans instead of moving a camera.
#[derive(Debug, Default)]
struct TerminalSurface {
    last_pan: Option<Coordinates>,
}

impl MapSurface for TerminalSurface {
    fn pan_to(&mut self, at: Coordinates) {
        self.last_pan = Some(at);
    }
}

pub(crate) async fn run(client: &VendmapClient, command: &MachineCommands) -> anyhow::Result<()> {
    match command {
        MachineCommands::List => run_list(client).await,
        MachineCommands::Show { id } => run_show(client, *id).await,
        MachineCommands::Group { id, tolerance } => run_group(client, *id, *tolerance).await,
        MachineCommands::Clusters { tolerance } => run_clusters(client, *tolerance).await,
        MachineCommands::Add {
            lat,
            lon,
            building,
            location,
            desc,
            items,
            unavailable,
            image,
        } => {
            let position = match (building, lat, lon) {
                (Some(name), _, _) => Some(resolve_building(client, name).await?),
                (None, Some(lat), Some(lon)) => Some(Coordinates::new(*lat, *lon)),
                _ => None,
            };
            let location = location.clone().or_else(|| building.clone());
            let draft = build_add_draft(position, location, desc, items, !*unavailable)?;
            run_add(client, draft, image.as_deref()).await
        }
        MachineCommands::Edit {
            id,
            add,
            toggle,
            remove,
            available,
        } => run_edit(client, *id, add, toggle, remove, *available).await,
    }
}

async fn resolve_building(client: &VendmapClient, name: &str) -> anyhow::Result<Coordinates> {
    let search = client.search_buildings(name).await?;
    search
        .exact
        .map(|b| b.coordinates())
        .ok_or_else(|| anyhow::anyhow!("unknown building '{name}'; try `buildings {name}`"))
}

/// Turn `add` arguments into a validated draft. A CLI user has always
/// "granted" location, since coordinates are given explicitly.
pub(crate) fn build_add_draft(
    position: Option<Coordinates>,
    location: Option<String>,
    desc: &str,
    items: &[String],
    available: bool,
) -> anyhow::Result<MachineDraft> {
    let mut draft = MachineDraft::begin(LocationPermission::Granted)?;
    if let Some(at) = position {
        draft.set_position(at);
    }
    draft.location = location.unwrap_or_default();
    draft.desc = desc.to_owned();
    draft.available = available;
    for item in items {
        if !draft.add_item(item) {
            tracing::debug!("skipping blank item name");
        }
    }
    Ok(draft)
}

/// Apply edit arguments in a fixed order: toggles, removals (highest index
/// first so earlier positions stay valid), then additions.
pub(crate) fn apply_edits(
    draft: &mut MachineDraft,
    add: &[String],
    toggle: &[usize],
    remove: &[usize],
    available: Option<bool>,
) {
    for index in toggle {
        draft.toggle_item(*index);
    }
    let mut remove = remove.to_vec();
    remove.sort_unstable_by(|a, b| b.cmp(a));
    remove.dedup();
    for index in remove {
        draft.remove_item(index);
    }
    for name in add {
        draft.add_item(name);
    }
    if let Some(available) = available {
        draft.available = available;
    }
}

async fn run_list(client: &VendmapClient) -> anyhow::Result<()> {
    let machines = client.list_machines().await?;
    if machines.is_empty() {
        println!("no vending machines yet; add one with `machines add`");
        return Ok(());
    }

    println!(
        "{:<6}{:>12}{:>14}  {:<6}{:<20}DESC",
        "ID", "LAT", "LON", "OPEN", "LOCATION"
    );
    for machine in &machines {
        println!("{}", format_row(machine));
    }
    Ok(())
}

pub(crate) fn format_row(machine: &VendingMachineRecord) -> String {
    let open = if machine.available { "yes" } else { "no" };
    format!(
        "{:<6}{:>12.6}{:>14.6}  {:<6}{:<20}{}",
        machine.id, machine.lat, machine.lon, open, machine.location, machine.desc
    )
}

fn print_detail(machine: &VendingMachineRecord) {
    println!("#{} {}", machine.id, machine.location);
    println!("  {}", machine.desc);
    println!("  at {:.6}, {:.6}", machine.lat, machine.lon);
    println!(
        "  {}",
        if machine.available {
            "available"
        } else {
            "unavailable"
        }
    );
    println!("  photo: {}", machine.photo_url().unwrap_or("(placeholder)"));
    for (index, item) in machine.parsed_items().iter().enumerate() {
        let mark = if item.available { "x" } else { " " };
        println!("  [{mark}] {index}: {}", item.name);
    }
}

async fn run_show(client: &VendmapClient, id: i64) -> anyhow::Result<()> {
    let machine = client.get_machine(id).await?;
    print_detail(&machine);
    Ok(())
}

async fn run_group(client: &VendmapClient, id: i64, tolerance: f64) -> anyhow::Result<()> {
    let mut view = MapView::new(ProximityGrouper::new(tolerance)?);
    refresh_view(client, &mut view).await?;

    let mut surface = TerminalSurface::default();
    view.click_marker(id, &mut surface);
    if let Some(at) = surface.last_pan {
        println!("centered on {:.6}, {:.6}", at.lat, at.lon);
    }

    match view.active_popup() {
        Popup::None => anyhow::bail!("no machine with id {id}"),
        Popup::Single(machine) => print_detail(machine),
        Popup::Group(members) => {
            println!("{} machines at this spot:", members.len());
            for machine in members {
                println!("{}", format_row(machine));
            }
        }
    }
    Ok(())
}

async fn run_clusters(client: &VendmapClient, tolerance: f64) -> anyhow::Result<()> {
    let grouper = ProximityGrouper::new(tolerance)?;
    let machines = client.list_machines().await?;

    let shared: Vec<_> = grouper
        .clusters(&machines)
        .into_iter()
        .filter(|cluster| cluster.len() > 1)
        .collect();
    if shared.is_empty() {
        println!("no co-located machines");
        return Ok(());
    }

    for cluster in shared {
        let ids: Vec<String> = cluster.iter().map(|m| m.id.to_string()).collect();
        println!(
            "{:.6}, {:.6}: {}",
            cluster[0].lat,
            cluster[0].lon,
            ids.join(", ")
        );
    }
    Ok(())
}

async fn run_add(
    client: &VendmapClient,
    draft: MachineDraft,
    image: Option<&std::path::Path>,
) -> anyhow::Result<()> {
    let machine = draft.into_new_machine()?;
    let upload = match image {
        Some(path) => Some(ImageUpload::from_path(path).await?),
        None => None,
    };

    let created = client.create_machine(&machine, upload).await?;
    println!("created machine #{}", created.id);
    print_detail(&created);
    Ok(())
}

async fn run_edit(
    client: &VendmapClient,
    id: i64,
    add: &[String],
    toggle: &[usize],
    remove: &[usize],
    available: Option<bool>,
) -> anyhow::Result<()> {
    let current = client.get_machine(id).await?;
    let mut draft = MachineDraft::from_record(&current);
    apply_edits(&mut draft, add, toggle, remove, available);

    let updated = client.update_machine(id, &draft.into_update()).await?;
    println!("updated machine #{}", updated.id);
    print_detail(&updated);
    Ok(())
}
