// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! The real-time sampler engine: note events in, mixed stereo cycles out.

use std::sync::Arc;

use crossbeam_channel::Receiver;
use midly::live::LiveEvent;
use midly::MidiMessage;
use tracing::debug;

use super::kit::Kit;
use super::loader::KitUpdate;
use super::voice::Voice;

/// The MIDI note mapped to voice slot zero unless reconfigured: middle C.
pub const DEFAULT_BASE_NOTE: u8 = 60;

/// A raw protocol event and its frame timestamp within the cycle.
#[derive(Clone, Copy, Debug)]
pub struct TimedEvent<'a> {
    /// Frame offset of the event within the cycle.
    pub frame: u32,
    /// The raw MIDI bytes of the event.
    pub data: &'a [u8],
}

/// The sampler engine owns the published kit, one voice per kit slot, and
/// the note mapping. `run_cycle` is the real-time entry point: it performs
/// no allocation, no I/O, and no blocking synchronization. Everything else
/// (loading, publication) happens on the loader's thread and reaches the
/// engine through the kit update channel.
pub struct SamplerEngine {
    /// The currently published kit.
    kit: Arc<Kit>,
    /// One playback cursor per kit slot.
    voices: Vec<Voice>,
    /// The MIDI note mapped to slot zero.
    base_note: u8,
    /// Kit publications from the loader, observed at cycle start.
    kit_updates: Option<Receiver<KitUpdate>>,
}

impl SamplerEngine {
    /// Creates an engine with no kit. Until a kit is installed every cycle
    /// renders silence.
    pub fn new() -> Self {
        Self {
            kit: Arc::new(Kit::empty()),
            voices: Vec::new(),
            base_note: DEFAULT_BASE_NOTE,
            kit_updates: None,
        }
    }

    /// Attaches the kit publication channel from a loader. Updates are
    /// picked up at the start of the next cycle.
    pub fn attach_kit_updates(&mut self, updates: Receiver<KitUpdate>) {
        self.kit_updates = Some(updates);
    }

    /// Sets the MIDI note mapped to voice slot zero.
    pub fn set_base_note(&mut self, base_note: u8) {
        self.base_note = base_note;
    }

    /// Gets the currently published kit.
    pub fn kit(&self) -> &Kit {
        &self.kit
    }

    /// Gets the number of voices currently playing.
    pub fn active_voices(&self) -> usize {
        self.voices.iter().filter(|v| v.is_active()).count()
    }

    #[cfg(test)]
    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    /// Installs a kit immediately, replacing the voice table with the
    /// update's inert one. All playback stops.
    pub fn install_kit(&mut self, update: KitUpdate) {
        let (kit, voices) = update.into_parts();
        debug!(kit = kit.name(), voices = voices.len(), "Installed kit");
        self.kit = kit;
        self.voices = voices;
    }

    /// Renders one processing cycle: applies any pending kit publication,
    /// demultiplexes this cycle's events onto the voice table, then mixes
    /// every active voice into the output pair. The outputs are fully
    /// overwritten; if nothing is playing they are filled with silence.
    pub fn run_cycle(&mut self, events: &[TimedEvent], left: &mut [f32], right: &mut [f32]) {
        debug_assert_eq!(left.len(), right.len());

        self.poll_kit_updates();

        for event in events {
            self.handle_event(event);
        }

        let frames = left.len().min(right.len());
        let left = &mut left[..frames];
        let right = &mut right[..frames];
        left.fill(0.0);
        right.fill(0.0);

        for (voice, sample) in self.voices.iter_mut().zip(self.kit.samples()) {
            voice.mix_into(sample, left, right);
        }
    }

    /// Takes the newest pending kit publication, if any. A backlog of
    /// publications collapses to the most recent one.
    fn poll_kit_updates(&mut self) {
        let Some(updates) = &self.kit_updates else {
            return;
        };

        let mut latest = None;
        while let Ok(update) = updates.try_recv() {
            latest = Some(update);
        }
        if let Some(update) = latest {
            self.install_kit(update);
        }
    }

    /// Demultiplexes one event. Note-ons trigger the mapped voice; note-offs
    /// are deliberately ignored (one-shot playback); anything else,
    /// including bytes that don't parse as MIDI, is skipped without aborting
    /// the cycle.
    fn handle_event(&mut self, event: &TimedEvent) {
        let parsed = match LiveEvent::parse(event.data) {
            Ok(parsed) => parsed,
            Err(err) => {
                debug!(frame = event.frame, error = ?err, "Skipping unparseable event");
                return;
            }
        };

        let LiveEvent::Midi { message, .. } = parsed else {
            return;
        };

        match message {
            MidiMessage::NoteOn { key, .. } => self.trigger_note(u8::from(key)),
            MidiMessage::NoteOff { .. } => {}
            _ => {}
        }
    }

    /// Triggers the voice mapped to the given note, if there is one. The
    /// subtraction is signed: a base note above the incoming note selects
    /// no voice rather than wrapping around.
    fn trigger_note(&mut self, note: u8) {
        let index = note as i32 - self.base_note as i32;
        if index < 0 || index as usize >= self.voices.len() {
            return;
        }
        self.voices[index as usize].trigger();
    }
}

impl Default for SamplerEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SamplerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SamplerEngine")
            .field("kit", &self.kit.name())
            .field("voices", &self.voices.len())
            .field("active_voices", &self.active_voices())
            .field("base_note", &self.base_note)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::kit::Sample;

    fn note_on(note: u8) -> [u8; 3] {
        [0x90, note, 0x64]
    }

    fn note_off(note: u8) -> [u8; 3] {
        [0x80, note, 0x00]
    }

    fn event(data: &[u8]) -> TimedEvent {
        TimedEvent { frame: 0, data }
    }

    fn engine_with_kit(samples: Vec<Sample>) -> SamplerEngine {
        let mut engine = SamplerEngine::new();
        engine.install_kit(KitUpdate::new(Arc::new(Kit::new(
            "test".to_string(),
            samples,
        ))));
        engine
    }

    fn four_frame_mono() -> Sample {
        Sample::from_interleaved(vec![0.1, 0.2, 0.3, 0.4], 1)
    }

    #[test]
    fn test_one_shot_playback_across_cycles() {
        let mut engine = engine_with_kit(vec![four_frame_mono()]);
        let mut left = [0.0f32; 2];
        let mut right = [0.0f32; 2];

        // Cycle 1: the note-on starts playback at the cycle boundary.
        engine.run_cycle(&[event(&note_on(60))], &mut left, &mut right);
        assert_eq!(left, [0.1, 0.2]);
        assert_eq!(right, [0.1, 0.2]);
        assert_eq!(engine.voices()[0].offset(), 2);
        assert!(engine.voices()[0].is_active());

        // Cycle 2: no events; the voice keeps playing and exhausts itself.
        engine.run_cycle(&[], &mut left, &mut right);
        assert_eq!(left, [0.3, 0.4]);
        assert_eq!(right, [0.3, 0.4]);
        assert!(!engine.voices()[0].is_active());

        // Cycle 3: silence.
        engine.run_cycle(&[], &mut left, &mut right);
        assert_eq!(left, [0.0, 0.0]);
        assert_eq!(right, [0.0, 0.0]);
    }

    #[test]
    fn test_notes_map_to_slots_by_base_note() {
        let mut engine = engine_with_kit(vec![four_frame_mono(), four_frame_mono()]);

        engine.run_cycle(&[event(&note_on(61))], &mut [0.0; 1], &mut [0.0; 1]);
        assert!(!engine.voices()[0].is_active());
        assert!(engine.voices()[1].is_active());
    }

    #[test]
    fn test_out_of_range_notes_change_nothing() {
        let mut engine = engine_with_kit(vec![four_frame_mono()]);

        // Above the mapped range, and below the base note. The latter is the
        // underflow hazard: 59 - 60 must not wrap into a huge index.
        for note in [61, 59, 0, 127] {
            engine.run_cycle(&[event(&note_on(note))], &mut [0.0; 1], &mut [0.0; 1]);
            assert_eq!(engine.active_voices(), 0, "note {} should not trigger", note);
        }
    }

    #[test]
    fn test_base_note_is_configurable() {
        let mut engine = engine_with_kit(vec![four_frame_mono()]);
        engine.set_base_note(36);

        engine.run_cycle(&[event(&note_on(60))], &mut [0.0; 1], &mut [0.0; 1]);
        assert_eq!(engine.active_voices(), 0);

        engine.run_cycle(&[event(&note_on(36))], &mut [0.0; 1], &mut [0.0; 1]);
        assert_eq!(engine.active_voices(), 1);
    }

    #[test]
    fn test_note_off_is_ignored() {
        let mut engine = engine_with_kit(vec![four_frame_mono()]);
        let mut left = [0.0f32; 2];
        let mut right = [0.0f32; 2];

        engine.run_cycle(&[event(&note_on(60))], &mut left, &mut right);
        let offset = engine.voices()[0].offset();

        engine.run_cycle(&[event(&note_off(60))], &mut left, &mut right);
        assert!(engine.voices()[0].is_active());
        assert_eq!(engine.voices()[0].offset(), offset + 2);
    }

    #[test]
    fn test_unrecognized_events_are_skipped() {
        let mut engine = engine_with_kit(vec![four_frame_mono()]);
        let mut left = [0.0f32; 2];
        let mut right = [0.0f32; 2];

        // A controller message, garbage bytes, and an empty payload, with a
        // valid trigger in between: the trigger must still land.
        let cc = [0xB0u8, 0x01, 0x40];
        let junk = [0xFFu8, 0xFF];
        let trigger = note_on(60);
        let events = [
            event(&cc),
            event(&junk),
            event(&[]),
            event(&trigger),
        ];
        engine.run_cycle(&events, &mut left, &mut right);

        assert_eq!(engine.active_voices(), 1);
        assert_eq!(left, [0.1, 0.2]);
    }

    #[test]
    fn test_retrigger_restarts_from_zero() {
        let mut engine = engine_with_kit(vec![four_frame_mono()]);
        let mut left = [0.0f32; 2];
        let mut right = [0.0f32; 2];

        engine.run_cycle(&[event(&note_on(60))], &mut left, &mut right);
        assert_eq!(engine.voices()[0].offset(), 2);

        // Retriggering rewinds instead of layering a second copy.
        engine.run_cycle(&[event(&note_on(60))], &mut left, &mut right);
        assert_eq!(left, [0.1, 0.2]);
        assert_eq!(engine.voices()[0].offset(), 2);
    }

    #[test]
    fn test_two_voices_sum() {
        let samples = vec![
            Sample::from_interleaved(vec![0.1, 0.2], 1),
            Sample::from_interleaved(vec![0.3, -0.1, 0.4, -0.2], 2),
        ];
        let mut engine = engine_with_kit(samples);
        let mut left = [0.0f32; 2];
        let mut right = [0.0f32; 2];

        engine.run_cycle(
            &[event(&note_on(60)), event(&note_on(61))],
            &mut left,
            &mut right,
        );

        // Mono voice duplicated into both channels, stereo deinterleaved,
        // contributions summed with no gain or clamping.
        assert!((left[0] - 0.4).abs() < 1e-6);
        assert!((left[1] - 0.6).abs() < 1e-6);
        assert!((right[0] - 0.0).abs() < 1e-6);
        assert!((right[1] - 0.0).abs() < 1e-6);
    }

    #[test]
    fn test_tail_beyond_exhausted_voice_is_silence() {
        let mut engine = engine_with_kit(vec![Sample::from_interleaved(vec![0.5], 1)]);
        let mut left = [9.9f32; 4];
        let mut right = [9.9f32; 4];

        engine.run_cycle(&[event(&note_on(60))], &mut left, &mut right);
        assert_eq!(left, [0.5, 0.0, 0.0, 0.0]);
        assert_eq!(right, [0.5, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_silence_when_no_voice_is_active() {
        let mut engine = engine_with_kit(vec![four_frame_mono()]);
        let mut left = [1.0f32; 8];
        let mut right = [1.0f32; 8];

        engine.run_cycle(&[], &mut left, &mut right);
        assert_eq!(left, [0.0; 8]);
        assert_eq!(right, [0.0; 8]);
    }

    #[test]
    fn test_engine_without_kit_renders_silence() {
        let mut engine = SamplerEngine::new();
        let mut left = [1.0f32; 4];
        let mut right = [1.0f32; 4];

        engine.run_cycle(&[event(&note_on(60))], &mut left, &mut right);
        assert_eq!(left, [0.0; 4]);
        assert_eq!(engine.active_voices(), 0);
    }

    #[test]
    fn test_kit_publication_lands_at_cycle_start() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut engine = engine_with_kit(vec![four_frame_mono()]);
        engine.attach_kit_updates(rx);
        let mut left = [0.0f32; 2];
        let mut right = [0.0f32; 2];

        // Start a voice on the old kit, then publish a new kit mid-stream.
        engine.run_cycle(&[event(&note_on(60))], &mut left, &mut right);
        assert!(engine.voices()[0].is_active());

        let new_kit = Arc::new(Kit::new(
            "replacement".to_string(),
            vec![four_frame_mono(), four_frame_mono()],
        ));
        tx.send(KitUpdate::new(new_kit)).expect("send update");

        // The next cycle observes the swap with a fresh, inert voice table.
        engine.run_cycle(&[], &mut left, &mut right);
        assert_eq!(engine.kit().name(), "replacement");
        assert_eq!(engine.voices().len(), 2);
        assert_eq!(engine.active_voices(), 0);
        assert_eq!(left, [0.0, 0.0]);
    }

    #[test]
    fn test_backlogged_publications_collapse_to_newest() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut engine = SamplerEngine::new();
        engine.attach_kit_updates(rx);

        for name in ["first", "second", "third"] {
            tx.send(KitUpdate::new(Arc::new(Kit::new(
                name.to_string(),
                vec![four_frame_mono()],
            ))))
            .expect("send update");
        }

        engine.run_cycle(&[], &mut [0.0; 1], &mut [0.0; 1]);
        assert_eq!(engine.kit().name(), "third");
    }
}
