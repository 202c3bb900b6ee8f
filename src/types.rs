//! Small value types shared across the engine's typed command surface.

/// The splicer's operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Normal automatic splicing.
    Normal,
    /// Manual adjustment (factory/service mode).
    Manual,
}

impl Mode {
    /// The wire byte for this mode.
    pub fn code(self) -> u8 {
        match self {
            Mode::Normal => 0x00,
            Mode::Manual => 0x01,
        }
    }

    /// Look up a mode by its wire byte.
    pub fn from_code(code: u8) -> Option<Mode> {
        match code {
            0x00 => Some(Mode::Normal),
            0x01 => Some(Mode::Manual),
            _ => None,
        }
    }
}

/// Which motor a manual move targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorSide {
    /// The left fiber feed/alignment motors.
    Left,
    /// The right fiber feed/alignment motors.
    Right,
    /// The camera focus motors.
    Focus,
}

/// Direction of a manual motor move, in terms of the image on the device
/// screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorDirection {
    Up,
    Down,
    Left,
    Right,
}

/// Map a (side, direction) pair to the motor-select and movement bytes of a
/// [`MoveMotor`](crate::opcode::Opcode::MoveMotor) parameter block.
pub fn motor_select(side: MotorSide, direction: MotorDirection) -> (u8, u8) {
    use MotorDirection as D;
    use MotorSide as S;
    match (side, direction) {
        (S::Left, D::Down) => (2, 4),
        (S::Left, D::Left) => (0, 2),
        (S::Left, D::Right) => (0, 1),
        (S::Left, D::Up) => (2, 3),
        (S::Right, D::Down) => (3, 4),
        (S::Right, D::Left) => (1, 1),
        (S::Right, D::Right) => (1, 2),
        (S::Right, D::Up) => (3, 3),
        (S::Focus, D::Left) => (5, 2),
        (S::Focus, D::Right) => (5, 1),
        (S::Focus, D::Down) => (4, 2),
        (S::Focus, D::Up) => (4, 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_round_trip() {
        for mode in [Mode::Normal, Mode::Manual] {
            assert_eq!(Mode::from_code(mode.code()), Some(mode));
        }
        assert_eq!(Mode::from_code(0x02), None);
    }

    #[test]
    fn motor_table() {
        // Left carriage moving down selects motor 2, movement 4.
        assert_eq!(motor_select(MotorSide::Left, MotorDirection::Down), (2, 4));
        assert_eq!(motor_select(MotorSide::Right, MotorDirection::Up), (3, 3));
        assert_eq!(motor_select(MotorSide::Focus, MotorDirection::Left), (5, 2));
    }

    #[test]
    fn motor_table_is_injective() {
        let mut seen = std::collections::HashSet::new();
        for side in [MotorSide::Left, MotorSide::Right, MotorSide::Focus] {
            for dir in [
                MotorDirection::Up,
                MotorDirection::Down,
                MotorDirection::Left,
                MotorDirection::Right,
            ] {
                assert!(seen.insert(motor_select(side, dir)), "{side:?}/{dir:?}");
            }
        }
    }
}
