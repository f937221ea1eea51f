//! Shape of a serialized [`StepState`](storyloom_core::StepState).

use storyloom_validation::{ObjectShape, Shape};

/// Shape of a start or end state.
pub fn step_state_shape() -> Shape {
    let hands = ObjectShape::permissive()
        .optional("left", Shape::nullable(Shape::string()))
        .optional("right", Shape::nullable(Shape::string()));
    let character = ObjectShape::permissive()
        .required("name", Shape::non_empty_string())
        .optional("location", Shape::string())
        .optional("stance", Shape::string())
        .optional("facing", Shape::string())
        .optional("emotion", Shape::string())
        .optional("props_in_hand", hands);
    let prop = ObjectShape::permissive()
        .required("name", Shape::non_empty_string())
        .optional("state", Shape::string())
        .optional("holder", Shape::nullable(Shape::string()));
    ObjectShape::permissive()
        .required("characters", Shape::array(character, 0, None))
        .optional("props", Shape::array(prop, 0, None))
        .optional("next_intent_hint", Shape::string())
        .into()
}
