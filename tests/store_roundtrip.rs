use picomod::model::{
    Action, ActionEvent, ButtonState, GpioPin, OutputTarget, OutputValue, Preset, Trigger,
};
use picomod::store::layout::STORE_CAPACITY;
use picomod::store::{ConfigStore, MemoryStore, SledStore};
use picomod::{MAX_ACTIONS, NUM_PRESETS};
use proptest::prelude::*;

fn button_state() -> impl Strategy<Value = ButtonState> {
    prop_oneof![Just(ButtonState::Pressed), Just(ButtonState::Released)]
}

fn trigger() -> impl Strategy<Value = Trigger> {
    prop_oneof![
        button_state().prop_map(Trigger::Switch1),
        button_state().prop_map(Trigger::Switch2),
        (1u8..=7, button_state()).prop_map(|(pin, state)| {
            Trigger::Gpio(GpioPin::new(pin).expect("pin in range"), state)
        }),
        (any::<u16>(), any::<u8>()).prop_map(|(number, value)| Trigger::MidiCc { number, value }),
        Just(Trigger::EnterBank),
        Just(Trigger::ExitBank),
        Just(Trigger::Boot),
        Just(Trigger::None),
    ]
}

fn output_target() -> impl Strategy<Value = OutputTarget> {
    (0u8..4).prop_map(|code| OutputTarget::from_code(code).expect("target code"))
}

fn output_value() -> impl Strategy<Value = OutputValue> {
    (0u8..3).prop_map(|code| OutputValue::from_code(code).expect("value code"))
}

// Payloads are stored verbatim, including values dispatch would reject
fn event() -> impl Strategy<Value = ActionEvent> {
    prop_oneof![
        (any::<u8>(), any::<u8>(), any::<u8>(), any::<u8>()).prop_map(
            |(channel, kind, data1, data2)| ActionEvent::Midi {
                channel,
                kind,
                data1,
                data2,
            }
        ),
        any::<u16>().prop_map(|value| ActionEvent::Expression { value }),
        (output_target(), output_value())
            .prop_map(|(target, value)| ActionEvent::Output { target, value }),
        (any::<u16>(), any::<u32>()).prop_map(|(index, colour)| ActionEvent::Led { index, colour }),
    ]
}

prop_compose! {
    fn action()(trigger in trigger(), event in event()) -> Action {
        Action::new(trigger, event)
    }
}

prop_compose! {
    fn preset()(
        id in any::<u16>(),
        expression_value in any::<u16>(),
        flags in any::<[bool; 5]>(),
        actions in prop::collection::vec(action(), 0..=MAX_ACTIONS),
    ) -> Preset {
        let mut preset = Preset::with_actions(actions).expect("bounded action list");
        preset.id = id;
        preset.expression_value = expression_value;
        preset.switch1_state = flags[0];
        preset.switch2_state = flags[1];
        preset.bypass_relay_state = flags[2];
        preset.aux_relay_state = flags[3];
        preset.analog_switch_state = flags[4];
        preset
    }
}

fn fresh_store() -> ConfigStore<MemoryStore> {
    let mut store = ConfigStore::new(MemoryStore::erased(STORE_CAPACITY)).unwrap();
    store.factory_reset().unwrap();
    store
}

proptest! {
    #[test]
    fn test_saved_preset_loads_back(index in 0..NUM_PRESETS, preset in preset()) {
        let mut store = fresh_store();
        store.save_preset(index, &preset).unwrap();
        prop_assert_eq!(store.load_preset(index).unwrap(), preset);
    }

    #[test]
    fn test_neighbouring_slots_are_untouched(index in 0..NUM_PRESETS, preset in preset()) {
        let mut store = fresh_store();
        store.save_preset(index, &preset).unwrap();

        for neighbour in [index.wrapping_sub(1), index + 1] {
            if neighbour < NUM_PRESETS {
                prop_assert_eq!(store.load_preset(neighbour).unwrap(), Preset::default());
            }
        }
        prop_assert!(store.load().unwrap().is_configured());
    }
}

#[test]
fn test_sled_image_survives_reopen() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("eeprom.sled");

    let mut preset = Preset::with_actions(vec![Action::new(
        Trigger::Switch1(ButtonState::Pressed),
        ActionEvent::Expression { value: 200 },
    )])
    .unwrap();
    preset.id = 42;
    preset.bypass_relay_state = true;

    {
        let mut store = ConfigStore::new(SledStore::open(&path, STORE_CAPACITY).unwrap()).unwrap();
        store.factory_reset().unwrap();
        store.save_preset(NUM_PRESETS - 1, &preset).unwrap();
    }

    let store = ConfigStore::new(SledStore::open(&path, STORE_CAPACITY).unwrap()).unwrap();
    assert!(store.load().unwrap().is_configured());
    assert_eq!(store.load_preset(NUM_PRESETS - 1).unwrap(), preset);
    assert_eq!(store.load_preset(0).unwrap(), Preset::default());
}
