//! Frame planning.
//!
//! A [`FramePlan`] is the CPU side of a camera's frame: which compute
//! dispatch to run, what to clear, which objects survived culling, and
//! in what order the passes execute. Building the plan touches no GPU
//! state, so ordering and culling decisions are testable on their own.

use bitflags::bitflags;
use glint_core::{cull_and_sort, RenderObject, RenderTag, SphereScene};

use crate::camera::CameraFrame;
use crate::ClearMode;

/// Compute workgroup edge length of the sphere trace kernel.
pub const WORKGROUP_SIZE: u32 = 8;

bitflags! {
    /// Which attachments the raster pass clears on load.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClearFlags: u32 {
        const COLOR = 1;
        const DEPTH = 1 << 1;
    }
}

/// One step of a camera's frame, in execution order.
#[derive(Debug, Clone, PartialEq)]
pub enum PassCommand {
    /// Run the sphere trace kernel over the whole viewport.
    Dispatch {
        groups_x: u32,
        groups_y: u32,
        width: u32,
        height: u32,
        sphere_count: u32,
    },
    /// Clear attachments when the raster pass begins.
    Clear { color: [f32; 4], flags: ClearFlags },
    /// Draw the procedural sky gradient behind everything.
    Skybox,
    /// Draw visible opaque objects, front to back.
    DrawOpaque { object_indices: Vec<usize> },
    /// Blend the trace overlay over the color target.
    Composite,
}

/// Ordered pass commands for one camera.
#[derive(Debug, Clone)]
pub struct FramePlan {
    commands: Vec<PassCommand>,
}

impl FramePlan {
    /// Plan a camera's frame.
    ///
    /// The trace dispatch always runs, even with an empty sphere scene,
    /// so the overlay holds zero coverage instead of stale data. Both
    /// attachments are always cleared.
    pub fn build(
        frame: &CameraFrame,
        scene: &SphereScene,
        objects: &[RenderObject],
        tag: RenderTag,
    ) -> Self {
        let width = frame.viewport.width;
        let height = frame.viewport.height;

        let mut commands = Vec::with_capacity(5);

        commands.push(PassCommand::Dispatch {
            groups_x: width.div_ceil(WORKGROUP_SIZE),
            groups_y: height.div_ceil(WORKGROUP_SIZE),
            width,
            height,
            sphere_count: scene.len() as u32,
        });

        commands.push(PassCommand::Clear {
            color: frame.clear.clear_color(),
            flags: ClearFlags::COLOR | ClearFlags::DEPTH,
        });

        if frame.clear == ClearMode::Skybox {
            commands.push(PassCommand::Skybox);
        }

        let frustum = frame.camera.frustum(frame.viewport.aspect());
        commands.push(PassCommand::DrawOpaque {
            object_indices: cull_and_sort(objects, &frustum, tag, frame.camera.position),
        });

        commands.push(PassCommand::Composite);

        Self { commands }
    }

    /// Commands in execution order.
    pub fn commands(&self) -> &[PassCommand] {
        &self.commands
    }

    /// Workgroup counts for the trace dispatch.
    pub fn dispatch_groups(&self) -> (u32, u32) {
        self.commands
            .iter()
            .find_map(|command| match command {
                PassCommand::Dispatch {
                    groups_x, groups_y, ..
                } => Some((*groups_x, *groups_y)),
                _ => None,
            })
            .unwrap_or((0, 0))
    }

    /// Sphere count the trace dispatch was planned for.
    pub fn sphere_count(&self) -> u32 {
        self.commands
            .iter()
            .find_map(|command| match command {
                PassCommand::Dispatch { sphere_count, .. } => Some(*sphere_count),
                _ => None,
            })
            .unwrap_or(0)
    }

    /// Clear color for the color attachment.
    pub fn clear_color(&self) -> [f32; 4] {
        self.commands
            .iter()
            .find_map(|command| match command {
                PassCommand::Clear { color, .. } => Some(*color),
                _ => None,
            })
            .unwrap_or([0.0; 4])
    }

    /// Which attachments to clear.
    pub fn clear_flags(&self) -> ClearFlags {
        self.commands
            .iter()
            .find_map(|command| match command {
                PassCommand::Clear { flags, .. } => Some(*flags),
                _ => None,
            })
            .unwrap_or(ClearFlags::empty())
    }

    /// Whether the sky gradient is drawn.
    pub fn has_skybox(&self) -> bool {
        self.commands
            .iter()
            .any(|command| matches!(command, PassCommand::Skybox))
    }

    /// Indices into the object list, front to back.
    pub fn visible_indices(&self) -> &[usize] {
        self.commands
            .iter()
            .find_map(|command| match command {
                PassCommand::DrawOpaque { object_indices } => Some(object_indices.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{Camera, CameraId, Viewport};
    use glam::{Mat4, Vec3};
    use glint_core::{Material, MeshKind};

    fn test_frame(clear: ClearMode) -> CameraFrame {
        CameraFrame::new(
            CameraId(0),
            Camera::new(Vec3::ZERO, Vec3::Z),
            Viewport::new(128, 128),
            clear,
        )
    }

    fn object_at(position: Vec3) -> RenderObject {
        RenderObject::new(
            MeshKind::Cube,
            Material::opaque(Vec3::ONE),
            Mat4::from_translation(position),
        )
    }

    #[test]
    fn commands_run_trace_then_raster_then_composite() {
        let scene = SphereScene::from_spheres(&[]);
        let objects = [object_at(Vec3::new(0.0, 0.0, 5.0))];
        let plan = FramePlan::build(
            &test_frame(ClearMode::Skybox),
            &scene,
            &objects,
            RenderTag::OPAQUE_LIT,
        );

        let commands = plan.commands();
        assert_eq!(commands.len(), 5);
        assert!(matches!(commands[0], PassCommand::Dispatch { .. }));
        assert!(matches!(commands[1], PassCommand::Clear { .. }));
        assert!(matches!(commands[2], PassCommand::Skybox));
        assert!(matches!(commands[3], PassCommand::DrawOpaque { .. }));
        assert!(matches!(commands[4], PassCommand::Composite));
    }

    #[test]
    fn solid_clear_skips_skybox() {
        let scene = SphereScene::from_spheres(&[]);
        let plan = FramePlan::build(
            &test_frame(ClearMode::Solid(Vec3::new(0.1, 0.2, 0.3))),
            &scene,
            &[],
            RenderTag::OPAQUE_LIT,
        );

        assert!(!plan.has_skybox());
        assert_eq!(plan.clear_color(), [0.1, 0.2, 0.3, 1.0]);
        assert_eq!(plan.clear_flags(), ClearFlags::COLOR | ClearFlags::DEPTH);
        assert_eq!(plan.commands().len(), 4);
    }

    #[test]
    fn dispatch_rounds_up_to_whole_workgroups() {
        let scene = SphereScene::from_spheres(&[]);
        let mut frame = test_frame(ClearMode::Skybox);
        frame.viewport = Viewport::new(129, 64);

        let plan = FramePlan::build(&frame, &scene, &[], RenderTag::OPAQUE_LIT);
        assert_eq!(plan.dispatch_groups(), (17, 8));
    }

    #[test]
    fn empty_scene_still_dispatches() {
        let scene = SphereScene::new();
        let plan = FramePlan::build(
            &test_frame(ClearMode::Skybox),
            &scene,
            &[],
            RenderTag::OPAQUE_LIT,
        );

        assert_eq!(plan.sphere_count(), 0);
        assert_eq!(plan.dispatch_groups(), (16, 16));
    }

    #[test]
    fn culled_objects_are_not_drawn() {
        let scene = SphereScene::new();
        let objects = [
            object_at(Vec3::new(0.0, 0.0, 5.0)),
            object_at(Vec3::new(0.0, 0.0, -5.0)),
        ];
        let plan = FramePlan::build(
            &test_frame(ClearMode::Skybox),
            &scene,
            &objects,
            RenderTag::OPAQUE_LIT,
        );

        assert_eq!(plan.visible_indices(), &[0]);
    }

    #[test]
    fn draw_order_is_front_to_back() {
        let scene = SphereScene::new();
        let objects = [
            object_at(Vec3::new(0.0, 0.0, 9.0)),
            object_at(Vec3::new(0.0, 0.0, 3.0)),
            object_at(Vec3::new(0.0, 0.0, 6.0)),
        ];
        let plan = FramePlan::build(
            &test_frame(ClearMode::Skybox),
            &scene,
            &objects,
            RenderTag::OPAQUE_LIT,
        );

        assert_eq!(plan.visible_indices(), &[1, 2, 0]);
    }
}
