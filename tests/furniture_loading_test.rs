use cubicle_view::{config::ViewerConfig, viewer::Viewer};

use crate::common::test_utils::{desk_asset, mount_headless};

mod common;

const FRAME: f32 = 1.0 / 60.0;

fn placeholder_children(viewer: &Viewer, name: &str) -> Vec<String> {
    let scene = &viewer.render_manager().unwrap().scene;
    let placeholder = scene.find_by_name(name).unwrap();
    scene
        .get(placeholder)
        .unwrap()
        .children()
        .iter()
        .map(|child| scene.get(*child).unwrap().name.clone())
        .collect()
}

#[test]
fn every_cubicle_requests_its_furniture() {
    let (_viewer, _log, loader) = mount_headless(&ViewerConfig::default());
    assert_eq!(loader.pending("desk.glb"), 6);
    assert_eq!(loader.pending("monitor.glb"), 6);
    assert_eq!(loader.pending("chair.glb"), 6);
}

#[test]
fn resolved_asset_is_attached_below_its_placeholder() {
    let (mut viewer, log, loader) = mount_headless(&ViewerConfig::default());
    viewer.frame_with_delta(FRAME);
    let uploads = log.borrow().geometry_uploads;
    let boxes = viewer.environment().unwrap().collidables().borrow().len();

    assert_eq!(loader.resolve("desk.glb", &desk_asset()), 6);
    viewer.frame_with_delta(FRAME);

    assert_eq!(placeholder_children(&viewer, "cubicle_00_desk"), vec!["desk"]);
    assert_eq!(placeholder_children(&viewer, "cubicle_05_desk"), vec!["desk"]);
    assert!(placeholder_children(&viewer, "cubicle_00_chair").is_empty());
    assert_eq!(log.borrow().geometry_uploads, uploads + 6 * 2);

    let environment = viewer.environment().unwrap();
    assert_eq!(environment.pending_loads(), 12);
    assert_eq!(environment.collidables().borrow().len(), boxes + 6 * 2);
}

#[test]
fn debug_bindings_follow_the_loaded_asset() {
    let (mut viewer, _log, loader) = mount_headless(&ViewerConfig::default());
    viewer.frame_with_delta(FRAME);
    let scene = &viewer.render_manager().unwrap().scene;
    let placeholder = scene.find_by_name("cubicle_00_desk").unwrap();
    assert_eq!(
        viewer.environment().unwrap().debug().bindings_for(placeholder).len(),
        9
    );

    loader.resolve("desk.glb", &desk_asset());
    viewer.frame_with_delta(FRAME);

    let scene = &viewer.render_manager().unwrap().scene;
    let desk = scene.get(placeholder).unwrap().children()[0];
    let debug = viewer.environment().unwrap().debug();
    assert!(!debug.is_bound(placeholder));
    let bindings = debug.bindings_for(desk);
    assert_eq!(bindings.len(), 9);
    assert!(bindings.iter().all(|b| b.label == "cubicle_00 (protagonist) desk"));
}

#[test]
fn debug_edits_reach_the_scene_on_the_next_frame() {
    let (mut viewer, _log, _loader) = mount_headless(&ViewerConfig::default());
    viewer.frame_with_delta(FRAME);
    let scene = &viewer.render_manager().unwrap().scene;
    let shell = scene.find_by_name("room_shell").unwrap();
    let binding = viewer.environment().unwrap().debug().bindings_for(shell)[0].id;

    assert!(
        viewer
            .environment_mut()
            .unwrap()
            .debug_mut()
            .set_value(binding, 0.5)
    );
    viewer.frame_with_delta(FRAME);

    let scene = &viewer.render_manager().unwrap().scene;
    assert_eq!(scene.get_local_transform(shell).unwrap().position.x, 0.5);
}

#[test]
fn moving_a_cubicle_moves_its_collision_boxes() {
    let (mut viewer, _log, _loader) = mount_headless(&ViewerConfig::default());
    viewer.frame_with_delta(FRAME);
    let scene = &viewer.render_manager().unwrap().scene;
    let cubicle = scene.find_by_name("cubicle_00").unwrap();
    let old_x = scene.get_local_transform(cubicle).unwrap().position.x;
    let binding = viewer.environment().unwrap().debug().bindings_for(cubicle)[0].id;
    let before = viewer.environment().unwrap().collidables().borrow().clone();

    viewer
        .environment_mut()
        .unwrap()
        .debug_mut()
        .set_value(binding, 5.0);
    viewer.frame_with_delta(FRAME);

    let scene = &viewer.render_manager().unwrap().scene;
    assert_eq!(scene.get_local_transform(cubicle).unwrap().position.x, 5.0);
    let after = viewer.environment().unwrap().collidables().borrow().clone();
    assert_eq!(after.len(), before.len());
    assert_ne!(after.boxes(), before.boxes());
    assert!(after.version() > before.version());

    // Only the three partitions of that cubicle moved, by the same amount.
    let shift = 5.0 - old_x;
    let moved: Vec<_> = before
        .boxes()
        .iter()
        .zip(after.boxes())
        .filter(|(old, new)| old != new)
        .collect();
    assert_eq!(moved.len(), 3);
    for (old, new) in moved {
        assert!((new.min.x - old.min.x - shift).abs() < 1e-4);
        assert!((new.max.z - old.max.z).abs() < 1e-4);
    }
}

#[test]
fn failed_loads_leave_the_slot_empty() {
    let (mut viewer, log, loader) = mount_headless(&ViewerConfig::default());
    viewer.frame_with_delta(FRAME);
    let uploads = log.borrow().geometry_uploads;

    assert_eq!(loader.fail("chair.glb"), 6);
    viewer.frame_with_delta(FRAME);

    assert!(placeholder_children(&viewer, "cubicle_02_chair").is_empty());
    assert_eq!(log.borrow().geometry_uploads, uploads);
    assert_eq!(viewer.environment().unwrap().pending_loads(), 12);
    assert!(viewer.is_mounted());
}

#[test]
fn disabled_debug_panel_binds_nothing_and_draws_no_overlay() {
    let config = ViewerConfig {
        debug_panel: false,
        ..Default::default()
    };
    let (mut viewer, log, _loader) = mount_headless(&config);
    viewer.frame_with_delta(FRAME);
    assert!(viewer.environment().unwrap().debug().is_empty());
    assert_eq!(log.borrow().overlay_frames, 0);
}
