use std::io::{self, Stdout, Write};
use std::time::{Duration, Instant};

use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, KeyboardEnhancementFlags, MouseButton, MouseEvent, MouseEventKind,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor};
use crossterm::terminal::{
    self, BeginSynchronizedUpdate, Clear, ClearType, EndSynchronizedUpdate, EnterAlternateScreen,
    LeaveAlternateScreen,
};
use crossterm::{cursor, execute, queue};

use crate::car::{Car, TICKS_PER_SECOND};
use crate::game::{Game, IntroForm, Race, Scene, Winner};
use crate::runtime::PlayerInput;

const MENU_FPS: f64 = 30.0;
const METERS_PER_COLUMN: f64 = 8.0;
const ACCELERATE_KEY: char = 'a';
// Terminals without release events only repeat a held key after a delay.
const ACCELERATE_LATCH: Duration = Duration::from_millis(500);
const CAR_SPRITE: &str = "o=[##]>";
const FLAG_CELLS: u16 = 10;

const TRACK_FIELD: Rect = Rect::new(10, 6, 22, 1);
const START_BUTTON: Rect = Rect::new(14, 10, 11, 1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rect {
    x: u16,
    y: u16,
    w: u16,
    h: u16,
}

impl Rect {
    const fn new(x: u16, y: u16, w: u16, h: u16) -> Self {
        Self { x, y, w, h }
    }

    const fn contains(self, column: u16, row: u16) -> bool {
        column >= self.x && column < self.x + self.w && row >= self.y && row < self.y + self.h
    }
}

/// Tracks the held accelerate key across frames.
#[derive(Debug, Default)]
struct AccelerateKey {
    reports_release: bool,
    held: bool,
    last_press: Option<Instant>,
}

impl AccelerateKey {
    const fn new(reports_release: bool) -> Self {
        Self {
            reports_release,
            held: false,
            last_press: None,
        }
    }

    fn press(&mut self, now: Instant) {
        self.held = true;
        self.last_press = Some(now);
    }

    fn release(&mut self) {
        self.held = false;
        self.last_press = None;
    }

    fn is_down(&self, now: Instant) -> bool {
        if self.reports_release {
            return self.held;
        }
        self.last_press
            .is_some_and(|pressed| now.saturating_duration_since(pressed) < ACCELERATE_LATCH)
    }
}

/// Raw-mode terminal on the alternate screen, restored on drop.
pub struct Tui {
    out: Stdout,
    enhanced_keys: bool,
}

impl Tui {
    pub fn new() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        let mut tui = Self {
            out: io::stdout(),
            enhanced_keys: false,
        };
        execute!(tui.out, EnterAlternateScreen, EnableMouseCapture, cursor::Hide)?;

        if matches!(terminal::supports_keyboard_enhancement(), Ok(true)) {
            execute!(
                tui.out,
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
            tui.enhanced_keys = true;
        }
        tracing::debug!(enhanced_keys = tui.enhanced_keys, "terminal ready");
        Ok(tui)
    }

    /// Runs the game until the player quits.
    pub fn run(&mut self, game: &mut Game) -> color_eyre::Result<()> {
        let mut accelerate = AccelerateKey::new(self.enhanced_keys);
        let mut scene = game.scene().name();

        loop {
            let fps = match game.scene() {
                Scene::Racing(_) => TICKS_PER_SECOND,
                _ => MENU_FPS,
            };
            let deadline = Instant::now() + Duration::from_secs_f64(1.0 / fps);
            let mut input = PlayerInput::default();

            loop {
                let timeout = deadline.saturating_duration_since(Instant::now());
                if !event::poll(timeout)? {
                    break;
                }
                let quit = match event::read()? {
                    Event::Key(key) => handle_key(game, key, &mut input, &mut accelerate),
                    Event::Mouse(mouse) => {
                        handle_mouse(game, mouse);
                        false
                    }
                    _ => false,
                };
                if quit {
                    tracing::info!(scene = game.scene().name(), "quit");
                    return Ok(());
                }
            }

            input.accelerate = accelerate.is_down(Instant::now());
            game.tick(input)?;

            if game.scene().name() != scene {
                tracing::info!(from = scene, to = game.scene().name(), "scene changed");
                scene = game.scene().name();
            }
            self.draw(game.scene())?;
        }
    }

    fn draw(&mut self, scene: &Scene) -> io::Result<()> {
        let (width, height) = terminal::size()?;
        queue!(
            self.out,
            BeginSynchronizedUpdate,
            ResetColor,
            Clear(ClearType::All)
        )?;
        match scene {
            Scene::Intro(form) => draw_intro(&mut self.out, form)?,
            Scene::Racing(race) => draw_race(&mut self.out, race, width, height)?,
            Scene::Victory { winner, race } => {
                draw_victory(&mut self.out, *winner, race, width, height)?;
            }
        }
        queue!(self.out, ResetColor, EndSynchronizedUpdate)?;
        self.out.flush()
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        if self.enhanced_keys {
            let _ = execute!(self.out, PopKeyboardEnhancementFlags);
        }
        let _ = execute!(
            self.out,
            ResetColor,
            DisableMouseCapture,
            LeaveAlternateScreen,
            cursor::Show
        );
        let _ = terminal::disable_raw_mode();
    }
}

/// Returns true when the key asks to quit.
fn handle_key(
    game: &mut Game,
    key: KeyEvent,
    input: &mut PlayerInput,
    accelerate: &mut AccelerateKey,
) -> bool {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    if let Some(form) = game.intro_mut() {
        if key.kind == KeyEventKind::Release {
            return false;
        }
        if form.active {
            match key.code {
                KeyCode::Char(c) => form.type_char(c),
                KeyCode::Backspace => form.backspace(),
                KeyCode::Enter => form.enter(),
                KeyCode::Esc => form.click_outside(),
                _ => {}
            }
            return false;
        }
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => return true,
            KeyCode::Tab => form.click_field(),
            KeyCode::Enter | KeyCode::Char('s') => {
                // The form keeps the error for the next frame.
                let _ = game.start();
            }
            _ => {}
        }
        return false;
    }

    match (key.code, key.kind) {
        (KeyCode::Esc | KeyCode::Char('q'), KeyEventKind::Press) => return true,
        (KeyCode::Char(ACCELERATE_KEY), KeyEventKind::Press | KeyEventKind::Repeat) => {
            accelerate.press(Instant::now());
        }
        (KeyCode::Char(ACCELERATE_KEY), KeyEventKind::Release) => accelerate.release(),
        (KeyCode::Char(c @ '1'..='6'), KeyEventKind::Press) => {
            input.gear = c.to_digit(10).and_then(|gear| u8::try_from(gear).ok());
        }
        _ => {}
    }
    false
}

fn handle_mouse(game: &mut Game, mouse: MouseEvent) {
    if mouse.kind != MouseEventKind::Down(MouseButton::Left) {
        return;
    }
    let Some(form) = game.intro_mut() else {
        return;
    };

    if TRACK_FIELD.contains(mouse.column, mouse.row) {
        form.click_field();
    } else {
        form.click_outside();
    }
    if START_BUTTON.contains(mouse.column, mouse.row) {
        let _ = game.start();
    }
}

/// Screen column of a point on the track, if it is visible.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn column(meters: f64, scroll: f64, width: u16) -> Option<u16> {
    let column = ((meters - scroll) / METERS_PER_COLUMN).floor();
    if column >= 0.0 && column < f64::from(width) {
        // In range, so the cast is exact.
        Some(column as u16)
    } else {
        None
    }
}

fn draw_intro(out: &mut impl Write, form: &IntroForm) -> io::Result<()> {
    let field_color = if form.active { Color::Blue } else { Color::White };
    let cursor = if form.active { "_" } else { "" };
    let text = format!("{}{cursor}", form.text);
    let width = usize::from(TRACK_FIELD.w) - 2;

    queue!(
        out,
        cursor::MoveTo(10, 4),
        SetForegroundColor(Color::White),
        Print("Set Track Length (meters):"),
        cursor::MoveTo(TRACK_FIELD.x, TRACK_FIELD.y),
        SetForegroundColor(field_color),
        Print(format!("[{text:<width$}]")),
        cursor::MoveTo(START_BUTTON.x, START_BUTTON.y),
        SetBackgroundColor(Color::Green),
        SetForegroundColor(Color::Black),
        Print("   Start   "),
        ResetColor,
    )?;

    if let Some(error) = &form.error {
        queue!(
            out,
            cursor::MoveTo(10, 8),
            SetForegroundColor(Color::Red),
            Print(error),
            ResetColor
        )?;
    }

    queue!(
        out,
        cursor::MoveTo(10, 13),
        SetForegroundColor(Color::DarkGrey),
        Print("Click the field (or Tab) to type, Enter to leave it."),
        cursor::MoveTo(10, 14),
        Print("Click Start (or Enter) to race. Hold A to accelerate, 1-6 pick a gear."),
        cursor::MoveTo(10, 15),
        Print("Empty field races the default 10000 m. Q quits."),
        ResetColor
    )
}

fn draw_car(
    out: &mut impl Write,
    car: &Car,
    row: u16,
    scroll: f64,
    width: u16,
    color: Color,
) -> io::Result<()> {
    let Some(start) = column(car.position, scroll, width) else {
        return Ok(());
    };
    let visible = usize::from(width - start).min(CAR_SPRITE.len());
    queue!(
        out,
        cursor::MoveTo(start, row),
        SetForegroundColor(color),
        Print(&CAR_SPRITE[..visible]),
        ResetColor
    )
}

// HUD readouts are whole numbers.
#[allow(clippy::cast_possible_truncation)]
fn draw_race(out: &mut impl Write, race: &Race, width: u16, height: u16) -> io::Result<()> {
    let scroll = race.scroll();
    let center = height / 2;
    let ai_row = height / 4;
    let player_row = center + height / 4;
    let player = race.player();

    let offset = (scroll / METERS_PER_COLUMN).floor();
    let dashes: String = (0..width)
        .map(|col| {
            // Dash pattern scrolls with the camera.
            if (offset + f64::from(col)).rem_euclid(4.0) < 2.0 {
                '-'
            } else {
                ' '
            }
        })
        .collect();
    queue!(out, cursor::MoveTo(0, center), Print(dashes))?;

    if let Some(finish) = column(race.track_length(), scroll, width) {
        queue!(out, SetForegroundColor(Color::Green))?;
        for row in 0..height.saturating_sub(5) {
            queue!(out, cursor::MoveTo(finish, row), Print('|'))?;
        }
        queue!(out, ResetColor)?;
    }

    draw_car(out, race.ai(), ai_row, scroll, width, Color::White)?;
    draw_car(out, player, player_row, scroll, width, Color::Red)?;

    if player.overheating {
        queue!(
            out,
            cursor::MoveTo((width / 2).saturating_sub(10), 1),
            SetForegroundColor(Color::Red),
            Print("ENGINE OVERHEATING!"),
            ResetColor
        )?;
    }

    let temperature_color = if player.temperature > 90.0 {
        Color::Red
    } else {
        Color::White
    };
    let hud = height.saturating_sub(4);
    queue!(
        out,
        cursor::MoveTo(0, center + 1),
        Print(format!("Distance: {} meters", player.position as i64)),
        cursor::MoveTo(0, hud),
        SetForegroundColor(temperature_color),
        Print(format!("Temp: {}°C", player.temperature as i64)),
        ResetColor,
        cursor::MoveTo(0, hud + 1),
        Print(format!("RPM: {}%", player.rpm as i64)),
        cursor::MoveTo(0, hud + 2),
        Print(format!("Speed: {} km/h", player.speed as i64)),
        cursor::MoveTo(0, hud + 3),
        Print(format!("Gear: {}", player.gear)),
    )
}

#[allow(clippy::cast_precision_loss)]
fn draw_victory(
    out: &mut impl Write,
    winner: Winner,
    race: &Race,
    width: u16,
    height: u16,
) -> io::Result<()> {
    let center = width / 2;
    let top = (height / 2).saturating_sub(FLAG_CELLS / 2 + 3);
    let seconds = race.ticks() as f64 / TICKS_PER_SECOND;

    queue!(
        out,
        cursor::MoveTo(center.saturating_sub(6), top),
        Print(format!("{winner} wins!")),
        cursor::MoveTo(center.saturating_sub(10), top + 1),
        SetForegroundColor(Color::DarkGrey),
        Print(format!("{:.0} m in {seconds:.2} s", race.track_length())),
        ResetColor
    )?;

    let flag_left = center.saturating_sub(FLAG_CELLS);
    for j in 0..FLAG_CELLS {
        queue!(out, cursor::MoveTo(flag_left, top + 3 + j))?;
        for i in 0..FLAG_CELLS {
            let color = if (i + j) % 2 == 0 {
                Color::Black
            } else {
                Color::White
            };
            queue!(out, SetBackgroundColor(color), Print("  "))?;
        }
        queue!(out, ResetColor)?;
    }

    queue!(
        out,
        cursor::MoveTo(center.saturating_sub(6), top + 4 + FLAG_CELLS),
        SetForegroundColor(Color::DarkGrey),
        Print("Q to quit"),
        ResetColor
    )
}
