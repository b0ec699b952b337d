use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use egui::Context as EguiContext;
use glam::Vec2;
use lemuria_assets::AvatarCatalog;
use lemuria_render::Background;
use lemuria_render_wgpu::{FrameStats, RenderError, WgpuRenderer, acquire_frame};
use lemuria_scene::{ClientConfig, LocalSession, SceneCommand, SceneLoop, Session, TickToken};
use lemuria_tools::{DemoLoader, DemoWorld, SceneInspector, demo_loader};
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{Key, KeyCode, NamedKey, PhysicalKey};
use winit::window::{Window, WindowId};

#[derive(Parser)]
#[command(name = "lemuria-desktop", about = "Lemuria desktop client")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Client config file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Instances per pool, overriding the config
    #[arg(long)]
    capacity: Option<u32>,

    /// Avatar catalog (avatars.dat) to dress the demo users from
    #[arg(long)]
    avatars: Option<PathBuf>,

    /// Remote users walking around
    #[arg(long, default_value = "4")]
    users: usize,
}

/// Seconds between two demo transport snapshots.
const SNAPSHOT_PERIOD: f32 = 0.5;

/// Map a winit key to the key names the input state understands.
fn key_name(key: &Key) -> Option<&'static str> {
    match key {
        Key::Named(named) => match named {
            NamedKey::ArrowUp => Some("ArrowUp"),
            NamedKey::ArrowDown => Some("ArrowDown"),
            NamedKey::ArrowLeft => Some("ArrowLeft"),
            NamedKey::ArrowRight => Some("ArrowRight"),
            NamedKey::PageUp => Some("PageUp"),
            NamedKey::PageDown => Some("PageDown"),
            NamedKey::Control => Some("Control"),
            NamedKey::Shift => Some("Shift"),
            _ => None,
        },
        Key::Character(c) => match c.as_str() {
            "+" | "=" => Some("+"),
            "-" => Some("-"),
            _ => None,
        },
        _ => None,
    }
}

/// Application state.
struct AppState {
    scene: SceneLoop<DemoLoader>,
    /// Token of the next tick; `None` once the window is closing.
    token: Option<TickToken>,
    demo: DemoWorld,
    started: Instant,
    last_snapshot: f32,
    show_inspector: bool,
    cursor: Vec2,
    stats: FrameStats,
}

impl AppState {
    fn new(cli: &Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => ClientConfig::load(path)?,
            None => ClientConfig::default(),
        };
        if let Some(capacity) = cli.capacity {
            config.pool_capacity = capacity;
        }

        let avatars: Vec<String> = match &cli.avatars {
            Some(path) => AvatarCatalog::load(path)?
                .entries()
                .iter()
                .map(|entry| entry.geometry.clone())
                .collect(),
            None => vec!["andy.rwx".into(), "tina.rwx".into()],
        };

        let mut session = LocalSession::new().with_account("guest", "guest");
        session.login("guest", "guest")?;

        let (mut scene, token) = SceneLoop::create_scene(&session, config, (1280, 720), demo_loader())?;
        scene.set_background(Background::Color([0.53, 0.81, 0.92, 1.0]));
        scene.set_camera_offset(1.6);

        let demo = DemoWorld::new(10, cli.users, &avatars);
        for command in demo.populate() {
            scene.enqueue(command);
        }

        Ok(Self {
            scene,
            token: Some(token),
            demo,
            started: Instant::now(),
            last_snapshot: 0.0,
            show_inspector: true,
            cursor: Vec2::ZERO,
            stats: FrameStats::default(),
        })
    }

    fn handle_key(&mut self, event: &KeyEvent) {
        let pressed = event.state == ElementState::Pressed;
        if let Some(name) = key_name(&event.logical_key) {
            self.scene.input_mut().handle_key(name, pressed);
            return;
        }
        if !pressed || event.repeat {
            return;
        }
        match event.physical_key {
            PhysicalKey::Code(KeyCode::F1) => {
                self.show_inspector = !self.show_inspector;
            }
            PhysicalKey::Code(KeyCode::KeyC) => {
                let mode = self.scene.toggle_camera();
                tracing::info!(camera = ?mode, "camera switched");
            }
            PhysicalKey::Code(KeyCode::Delete | KeyCode::Backspace) => self.delete_selected(),
            _ => {}
        }
    }

    fn delete_selected(&mut self) {
        let Some(id) = self.scene.selection().selected() else {
            return;
        };
        let command = if self.scene.remote(id).is_some() {
            SceneCommand::Untrack { id }
        } else {
            SceneCommand::Despawn { id }
        };
        self.scene.enqueue(command);
        tracing::info!(%id, "deleted selection");
    }

    /// Feed the demo transport: one snapshot per user every period.
    fn feed_snapshots(&mut self) {
        let elapsed = self.started.elapsed().as_secs_f32();
        if elapsed - self.last_snapshot < SNAPSHOT_PERIOD {
            return;
        }
        self.last_snapshot = elapsed;
        for command in self.demo.snapshots(elapsed) {
            self.scene.enqueue(command);
        }
    }

    fn draw_labels(&self, ctx: &EguiContext) {
        let painter = ctx.layer_painter(egui::LayerId::new(
            egui::Order::Background,
            egui::Id::new("name_labels"),
        ));
        let ppp = ctx.pixels_per_point();
        for label in self.scene.labels().visible() {
            painter.text(
                egui::pos2(label.screen.x / ppp, label.screen.y / ppp),
                egui::Align2::CENTER_BOTTOM,
                &label.text,
                egui::FontId::proportional(14.0),
                egui::Color32::WHITE,
            );
        }
    }

    fn draw_ui(&mut self, ctx: &EguiContext) {
        self.draw_labels(ctx);
        if !self.show_inspector {
            return;
        }

        let summary = SceneInspector::summary(&self.scene);

        egui::SidePanel::left("inspector")
            .default_width(280.0)
            .show(ctx, |ui| {
                ui.heading("Lemuria");
                ui.separator();
                ui.label(format!("User: {}  Tick: {}", summary.user, summary.tick));
                ui.label(format!("Camera: {:?}", summary.camera));
                let p = summary.player_position;
                ui.label(format!(
                    "Player: ({:.1}, {:.1}, {:.1}) yaw {:.2} pitch {:.2}",
                    p.x, p.y, p.z, summary.player_orientation.yaw, summary.player_orientation.pitch
                ));
                ui.label(format!(
                    "Draw calls: {}  Instances: {}  Uploads: {}",
                    self.stats.draw_calls, self.stats.instances, self.stats.uploads
                ));
                ui.separator();

                ui.heading("Tools");
                ui.horizontal(|ui| {
                    if ui.button("Toggle camera (C)").clicked() {
                        self.scene.toggle_camera();
                    }
                    if ui.button("Delete selected (Del)").clicked() {
                        self.delete_selected();
                    }
                });
                if ui.button("Clean asset cache").clicked() {
                    self.scene.clean_cache();
                }

                ui.separator();
                ui.heading("Pools");
                for pool in &summary.pools {
                    let marker = if pool.placeholder { " (placeholder)" } else { "" };
                    ui.label(format!(
                        "{}: {}/{} draw={}{marker}",
                        pool.name, pool.live, pool.capacity, pool.draw_count
                    ));
                }
                ui.label(format!(
                    "Nodes: {}  Remotes: {}  Labels: {}  Pending loads: {}",
                    summary.nodes, summary.remotes, summary.visible_labels, summary.pending_loads
                ));

                if let Some(id) = summary.selected {
                    ui.separator();
                    ui.heading("Selection");
                    match SceneInspector::inspect_object(&self.scene, id) {
                        Some(info) => {
                            ui.label(info.to_string());
                        }
                        None => {
                            ui.label(format!("{id} (gone)"));
                        }
                    }
                }

                ui.separator();
                ui.small("F1: Inspector | Arrows: Move/Turn | PgUp/PgDn: Look | +/-: Rise");
                ui.small("Shift: Run | RMB: Select | C: Camera | Del: Delete");
            });
    }
}

/// Everything that exists only once the window does.
struct Gpu {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    renderer: WgpuRenderer,
    egui_winit: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
}

impl Gpu {
    fn new(window: Arc<Window>, egui_ctx: &EguiContext) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("create surface")?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| anyhow!("no suitable GPU adapter"))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("lemuria_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))
        .context("create device")?;

        let size = window.inner_size();
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or_else(|| anyhow!("surface reports no formats"))?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let renderer = WgpuRenderer::new(&device, surface_format, config.width, config.height);

        let egui_winit = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let egui_renderer = egui_wgpu::Renderer::new(&device, surface_format, None, 1, false);

        tracing::info!(
            "GPU initialized with {} backend",
            adapter.get_info().backend.to_str()
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
            renderer,
            egui_winit,
            egui_renderer,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.config.width = width.max(1);
        self.config.height = height.max(1);
        self.surface.configure(&self.device, &self.config);
        self.renderer
            .resize(&self.device, self.config.width, self.config.height);
    }

    fn paint_egui(
        &mut self,
        view: &wgpu::TextureView,
        egui_ctx: &EguiContext,
        full_output: egui::FullOutput,
    ) {
        let paint_jobs = egui_ctx.tessellate(full_output.shapes, full_output.pixels_per_point);
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: full_output.pixels_per_point,
        };

        for (id, image_delta) in &full_output.textures_delta.set {
            self.egui_renderer
                .update_texture(&self.device, &self.queue, *id, image_delta);
        }
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("egui_encoder"),
            });
        self.egui_renderer.update_buffers(
            &self.device,
            &self.queue,
            &mut encoder,
            &paint_jobs,
            &screen_descriptor,
        );
        {
            let mut pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("egui_pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    ..Default::default()
                })
                .forget_lifetime();
            self.egui_renderer
                .render(&mut pass, &paint_jobs, &screen_descriptor);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }
    }
}

struct GpuApp {
    state: AppState,
    window: Option<Arc<Window>>,
    gpu: Option<Gpu>,
    egui_ctx: EguiContext,
}

impl GpuApp {
    fn new(state: AppState) -> Self {
        Self {
            state,
            window: None,
            gpu: None,
            egui_ctx: EguiContext::default(),
        }
    }

    fn redraw(&mut self) {
        let Self {
            state,
            window,
            gpu,
            egui_ctx,
        } = self;
        let (Some(window), Some(gpu)) = (window.as_ref(), gpu.as_mut()) else {
            return;
        };
        let Some(token) = state.token.take() else {
            return;
        };
        state.feed_snapshots();

        let output = match acquire_frame(&gpu.surface) {
            Ok(output) => output,
            Err(RenderError::Lost) => {
                gpu.surface.configure(&gpu.device, &gpu.config);
                state.token = Some(token);
                return;
            }
            Err(e) => {
                tracing::error!("surface error: {e}");
                state.token = Some(token);
                return;
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let report = {
            let mut target = gpu.renderer.target(&gpu.device, &gpu.queue, &view);
            state.scene.tick(token, Instant::now(), &mut target)
        };
        match report {
            Ok(report) => {
                state.token = Some(report.next);
                state.stats = report.output;
                if let Some(pick) = report.pick {
                    tracing::info!(?pick, "pick");
                }
            }
            Err(e) => tracing::warn!("tick rejected: {e}"),
        }

        let raw_input = gpu.egui_winit.take_egui_input(window);
        let mut full_output = egui_ctx.run(raw_input, |ctx| state.draw_ui(ctx));
        let platform_output = std::mem::take(&mut full_output.platform_output);
        gpu.egui_winit.handle_platform_output(window, platform_output);
        gpu.paint_egui(&view, egui_ctx, full_output);

        output.present();
        window.request_redraw();
    }
}

impl ApplicationHandler for GpuApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = Window::default_attributes()
            .with_title("Lemuria")
            .with_inner_size(PhysicalSize::new(1280u32, 720));
        let window = match event_loop.create_window(attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                tracing::error!("failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };

        match Gpu::new(window.clone(), &self.egui_ctx) {
            Ok(gpu) => {
                self.state
                    .scene
                    .set_viewport(gpu.config.width, gpu.config.height);
                self.gpu = Some(gpu);
                self.window = Some(window);
            }
            Err(e) => {
                tracing::error!("failed to initialise GPU: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if let (Some(gpu), Some(window)) = (&mut self.gpu, &self.window) {
            let response = gpu.egui_winit.on_window_event(window, &event);
            if response.consumed {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                self.state.token = None;
                self.state.scene.teardown();
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let Some(gpu) = &mut self.gpu {
                    gpu.resize(new_size.width, new_size.height);
                    self.state
                        .scene
                        .set_viewport(gpu.config.width, gpu.config.height);
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                self.state.handle_key(&event);
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.state.cursor = Vec2::new(position.x as f32, position.y as f32);
            }
            WindowEvent::MouseInput {
                button: MouseButton::Right,
                state: ElementState::Pressed,
                ..
            } => {
                let cursor = self.state.cursor;
                self.state.scene.input_mut().request_pick(cursor);
            }
            WindowEvent::Focused(false) => {
                // key-up events are lost while unfocused
                self.state.scene.input_mut().clear();
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.state.token = None;
        self.state.scene.teardown();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    tracing::info!("lemuria-desktop starting");

    let state = AppState::new(&cli)?;
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = GpuApp::new(state);
    event_loop.run_app(&mut app)?;

    Ok(())
}
