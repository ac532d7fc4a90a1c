//! Motion intents and the fixed-format command frames sent to the arm.
//! Encoding is pure and total: every intent maps to exactly one frame,
//! with out-of-range fields clamped to the mechanism's travel limits.

/// Every frame starts with these two synchronization bytes.
pub const FRAME_SYNC: [u8; 2] = [0xA5, 0xA5];

/// Absolute pose command (rotation, B axis, C axis, gripper).
pub const CMD_POSE: u8 = 0x01;
/// Relative jog vector, each axis in {-1, 0, 1}.
pub const CMD_JOG: u8 = 0x02;
/// Linear-axis absolute position, big-endian high/low split.
pub const CMD_LINEAR_AXIS: u8 = 0x03;
/// Gripper-only command.
pub const CMD_GRIPPER: u8 = 0x04;

/// Travel limits of the physical arm, matching its control surface.
pub const ROTATION_MAX: u8 = 180;
pub const B_AXIS_MAX: u8 = 80;
pub const C_AXIS_MIN: u8 = 55;
pub const C_AXIS_MAX: u8 = 180;
pub const GRIPPER_MAX: u8 = 37;
pub const LINEAR_AXIS_MAX: u16 = 1500;

/// One arm-motion command, produced by the caller and consumed once by
/// [`encode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionIntent {
    /// Move every rotational axis and the gripper to an absolute position.
    AbsolutePose {
        rotation: u8,
        b_axis: u8,
        c_axis: u8,
        gripper: u8,
    },
    /// Incremental jog step, each axis -1, 0 or 1.
    RelativeJog { dx: i8, dy: i8, dz: i8 },
    /// Absolute position on the linear rail, 0..=1500.
    LinearAxisMove { position: u16 },
    /// Move only the gripper.
    GripperOnly { gripper: u8 },
    /// Return the arm to its origin pose.
    Reset,
}

impl MotionIntent {
    /// Origin pose, same values the reset frame carries.
    pub const HOME: MotionIntent = MotionIntent::AbsolutePose {
        rotation: 90,
        b_axis: 40,
        c_axis: 130,
        gripper: 0,
    };

    /// Canned demonstration poses shipped with the stock arm firmware.
    pub const ACTION_1: MotionIntent = MotionIntent::AbsolutePose {
        rotation: 130,
        b_axis: 50,
        c_axis: 75,
        gripper: 0,
    };
    pub const ACTION_2: MotionIntent = MotionIntent::AbsolutePose {
        rotation: 100,
        b_axis: 60,
        c_axis: 65,
        gripper: 15,
    };
    pub const ACTION_3: MotionIntent = MotionIntent::AbsolutePose {
        rotation: 50,
        b_axis: 50,
        c_axis: 70,
        gripper: 35,
    };

    /// Jog step with all axes zero, used to stop continuous motion.
    pub const JOG_STOP: MotionIntent = MotionIntent::RelativeJog {
        dx: 0,
        dy: 0,
        dz: 0,
    };
}

/// One encoded command frame. Frames are compared by byte equality for
/// the dispatcher's jog deduplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame(Vec<u8>);

impl Frame {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The command id byte following the sync bytes.
    pub fn command_id(&self) -> u8 {
        self.0[2]
    }

    /// Whether this frame belongs to the periodic jog stream.
    pub fn is_jog(&self) -> bool {
        self.command_id() == CMD_JOG
    }
}

/// Encodes an intent into its wire frame. Deterministic and infallible.
pub fn encode(intent: &MotionIntent) -> Frame {
    let mut bytes = Vec::with_capacity(8);
    bytes.extend_from_slice(&FRAME_SYNC);
    match *intent {
        MotionIntent::AbsolutePose {
            rotation,
            b_axis,
            c_axis,
            gripper,
        } => {
            bytes.push(CMD_POSE);
            bytes.push(rotation.min(ROTATION_MAX));
            bytes.push(b_axis.min(B_AXIS_MAX));
            bytes.push(c_axis.clamp(C_AXIS_MIN, C_AXIS_MAX));
            bytes.push(gripper.min(GRIPPER_MAX));
        }
        MotionIntent::RelativeJog { dx, dy, dz } => {
            bytes.push(CMD_JOG);
            bytes.push(dx.clamp(-1, 1) as u8);
            bytes.push(dy.clamp(-1, 1) as u8);
            bytes.push(dz.clamp(-1, 1) as u8);
        }
        MotionIntent::LinearAxisMove { position } => {
            let position = position.min(LINEAR_AXIS_MAX);
            bytes.push(CMD_LINEAR_AXIS);
            bytes.push((position / 256) as u8);
            bytes.push((position % 256) as u8);
        }
        MotionIntent::GripperOnly { gripper } => {
            bytes.push(CMD_GRIPPER);
            bytes.push(gripper.min(GRIPPER_MAX));
        }
        MotionIntent::Reset => {
            // The firmware expects the origin pose plus one reserved pad
            // byte; kept byte-for-byte for wire compatibility.
            bytes.push(CMD_POSE);
            bytes.extend_from_slice(&[90, 40, 130, 0, 0]);
        }
    }
    Frame(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_frame_starts_with_sync_and_matching_command_id() {
        let cases = [
            (MotionIntent::HOME, CMD_POSE),
            (MotionIntent::JOG_STOP, CMD_JOG),
            (MotionIntent::LinearAxisMove { position: 10 }, CMD_LINEAR_AXIS),
            (MotionIntent::GripperOnly { gripper: 5 }, CMD_GRIPPER),
            (MotionIntent::Reset, CMD_POSE),
        ];
        for (intent, id) in cases {
            let frame = encode(&intent);
            assert_eq!(&frame.as_bytes()[..2], &FRAME_SYNC);
            assert_eq!(frame.command_id(), id);
        }
    }

    #[test]
    fn pose_frame_carries_all_four_fields() {
        let frame = encode(&MotionIntent::AbsolutePose {
            rotation: 130,
            b_axis: 50,
            c_axis: 75,
            gripper: 0,
        });
        assert_eq!(frame.as_bytes(), &[0xA5, 0xA5, 0x01, 130, 50, 75, 0]);
    }

    #[test]
    fn pose_fields_clamp_to_travel_limits() {
        let frame = encode(&MotionIntent::AbsolutePose {
            rotation: 250,
            b_axis: 200,
            c_axis: 10,
            gripper: 99,
        });
        assert_eq!(frame.as_bytes(), &[0xA5, 0xA5, 0x01, 180, 80, 55, 37]);
    }

    #[test]
    fn jog_axes_encode_twos_complement() {
        let frame = encode(&MotionIntent::RelativeJog { dx: -1, dy: 0, dz: 1 });
        assert_eq!(frame.as_bytes(), &[0xA5, 0xA5, 0x02, 0xFF, 0x00, 0x01]);
    }

    #[test]
    fn jog_axes_clamp_to_unit_steps() {
        let frame = encode(&MotionIntent::RelativeJog {
            dx: 5,
            dy: -7,
            dz: 0,
        });
        assert_eq!(frame.as_bytes(), &[0xA5, 0xA5, 0x02, 0x01, 0xFF, 0x00]);
    }

    #[test]
    fn linear_axis_splits_into_high_and_low_bytes() {
        let cases = [(0u16, 0u8, 0u8), (256, 1, 0), (1500, 5, 220)];
        for (position, high, low) in cases {
            let frame = encode(&MotionIntent::LinearAxisMove { position });
            assert_eq!(frame.as_bytes(), &[0xA5, 0xA5, 0x03, high, low]);
        }
    }

    #[test]
    fn linear_axis_clamps_to_rail_length() {
        let frame = encode(&MotionIntent::LinearAxisMove { position: 9999 });
        assert_eq!(frame.as_bytes(), &[0xA5, 0xA5, 0x03, 5, 220]);
    }

    #[test]
    fn reset_preserves_firmware_payload() {
        let frame = encode(&MotionIntent::Reset);
        assert_eq!(frame.as_bytes(), &[0xA5, 0xA5, 0x01, 90, 40, 130, 0, 0]);
    }

    #[test]
    fn encoding_is_deterministic() {
        let intent = MotionIntent::GripperOnly { gripper: 20 };
        assert_eq!(encode(&intent), encode(&intent));
    }
}
