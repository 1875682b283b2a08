use bevy_ecs::{prelude::*, schedule::ScheduleLabel};

use crate::engine::bone_palette::BonePaletteSink;

use super::CharacterData;

#[derive(Clone, Debug, Eq, Hash, PartialEq, ScheduleLabel)]
pub struct AnimationSchedule;

/// Seconds since the last tick.
#[derive(Clone, Copy, Debug, Default, Resource)]
pub struct DeltaTime(pub f32);

/// Where a character's skinning matrices go after every tick.
#[derive(Component)]
pub struct BonePalette(pub Box<dyn BonePaletteSink + Send + Sync>);

impl BonePalette {
    pub fn new(sink: impl BonePaletteSink + Send + Sync + 'static) -> Self {
        Self(Box::new(sink))
    }
}

pub fn advance_characters(delta_time: Res<DeltaTime>, mut characters: Query<&mut CharacterData>) {
    for mut character in characters.iter_mut() {
        character.advance_animation(delta_time.0);
    }
}

pub fn upload_bone_palettes(mut characters: Query<(&CharacterData, &mut BonePalette)>) {
    for (character, mut palette) in characters.iter_mut() {
        palette.0.consume(character.skinning_matrices());
    }
}

/// Advance every character, then hand the results to their palettes.
pub fn animation_schedule() -> Schedule {
    let mut schedule = Schedule::new(AnimationSchedule);
    schedule.add_systems((advance_characters, upload_bone_palettes).chain());
    schedule
}
